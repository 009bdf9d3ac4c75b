#![no_main]

use libfuzzer_sys::fuzz_target;
use rhyme_sched::{ScheduleError, ScheduleOptions, compile_schedule};

fuzz_target!(|data: &[u8]| {
    let Ok(program) = serde_json::from_slice::<rhyme_ir::Program>(data) else {
        return;
    };
    // Analysis may reject the program, but a graph that builds must
    // always schedule into a verified stream.
    match compile_schedule(&program, &ScheduleOptions::default()) {
        Ok((graph, schedule)) => {
            if let Err(violation) = schedule.verify(&program, &graph) {
                panic!("invalid schedule: {violation}");
            }
        }
        Err(ScheduleError::Analysis(_)) => {}
        Err(e) => panic!("acyclic program failed to schedule: {e}"),
    }
});
