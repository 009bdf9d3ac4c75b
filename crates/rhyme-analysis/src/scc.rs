//! Strongly connected components (Tarjan's algorithm).

/// Returns the strongly connected components of a graph over nodes
/// `0..node_count`, with edges given by `successors`.
///
/// Components are returned in reverse topological order: every component
/// appears after all components reachable from it. Nodes inside a
/// component keep their discovery order. The traversal uses an explicit
/// stack, so deep graphs cannot overflow the call stack.
pub fn tarjan_scc<F, I>(node_count: usize, successors: F) -> Vec<Vec<usize>>
where
    F: Fn(usize) -> I,
    I: IntoIterator<Item = usize>,
{
    const UNVISITED: usize = usize::MAX;

    let mut index = vec![UNVISITED; node_count];
    let mut lowlink = vec![0usize; node_count];
    let mut on_stack = vec![false; node_count];
    let mut stack: Vec<usize> = Vec::new();
    let mut components = Vec::new();
    let mut next_index = 0usize;

    // (node, successors, position of the next successor to visit)
    let mut frames: Vec<(usize, Vec<usize>, usize)> = Vec::new();

    for root in 0..node_count {
        if index[root] != UNVISITED {
            continue;
        }

        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        frames.push((root, successors(root).into_iter().collect(), 0));

        while let Some(frame) = frames.last_mut() {
            let node = frame.0;
            if frame.2 < frame.1.len() {
                let next = frame.1[frame.2];
                frame.2 += 1;
                if index[next] == UNVISITED {
                    index[next] = next_index;
                    lowlink[next] = next_index;
                    next_index += 1;
                    stack.push(next);
                    on_stack[next] = true;
                    frames.push((next, successors(next).into_iter().collect(), 0));
                } else if on_stack[next] {
                    lowlink[node] = lowlink[node].min(index[next]);
                }
                continue;
            }

            frames.pop();
            if let Some(parent) = frames.last() {
                lowlink[parent.0] = lowlink[parent.0].min(lowlink[node]);
            }
            if lowlink[node] == index[node] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == node {
                        break;
                    }
                }
                component.reverse();
                components.push(component);
            }
        }
    }

    components
}
