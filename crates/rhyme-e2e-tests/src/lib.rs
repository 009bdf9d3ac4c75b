//! End-to-end tests for the Rhyme pipeline live under `tests/`.
