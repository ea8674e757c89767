use crate::event_log::activity_log::ActivityLog;

use super::cuts::Partitions;

/// Split for an exclusive-choice cut: every trace moves, whole, into the
/// first partition that covers all of its activities.
///
/// Traces covered by no single partition are dropped; the empty trace is
/// covered vacuously and lands in the first partition.
pub fn exclusive_split(log: &ActivityLog, partitions: &Partitions) -> Vec<ActivityLog> {
    let mut sub_logs = vec![ActivityLog::new(); partitions.len()];
    for (trace, frequency) in log.iter() {
        let owner = partitions
            .iter()
            .position(|partition| trace.iter().all(|activity| partition.contains(activity)));
        if let Some(i) = owner {
            sub_logs[i].accumulate(trace.clone(), frequency);
        }
    }
    sub_logs
}

/// Split for a sequence cut: each trace is sliced into one sub-trace per
/// partition, with every event routed to the partition owning its activity.
///
/// Partitions a trace never visits contribute an *empty* sub-trace, which is
/// what later turns into the tau branch of a skippable part. Events owned by
/// no partition are skipped.
pub fn sequence_split(log: &ActivityLog, partitions: &Partitions) -> Vec<ActivityLog> {
    let mut sub_logs = vec![ActivityLog::new(); partitions.len()];
    for (trace, frequency) in log.iter() {
        let mut sub_traces = vec![Vec::new(); partitions.len()];
        for activity in trace {
            let owner = partitions
                .iter()
                .position(|partition| partition.contains(activity));
            if let Some(i) = owner {
                sub_traces[i].push(activity.clone());
            }
        }
        for (i, sub_trace) in sub_traces.into_iter().enumerate() {
            sub_logs[i].accumulate(sub_trace, frequency);
        }
    }
    sub_logs
}

/// Split for a parallel cut: each trace is projected onto every partition's
/// alphabet, preserving the relative event order.
///
/// A projection may be empty; like the sequence split it is recorded, since
/// an interleaved part the trace never touches is a skippable part.
pub fn parallel_split(log: &ActivityLog, partitions: &Partitions) -> Vec<ActivityLog> {
    let mut sub_logs = vec![ActivityLog::new(); partitions.len()];
    for (trace, frequency) in log.iter() {
        for (i, partition) in partitions.iter().enumerate() {
            let projection: Vec<_> = trace
                .iter()
                .filter(|activity| partition.contains(*activity))
                .cloned()
                .collect();
            sub_logs[i].accumulate(projection, frequency);
        }
    }
    sub_logs
}

/// Split for a loop cut: each trace is chopped into maximal runs staying
/// inside one partition; every run becomes a trace of that partition's
/// sub-log.
///
/// A body executed n times therefore contributes n body traces and n-1 (or
/// fewer) redo traces, which keeps the sub-log frequencies consistent with
/// the unrolled loop. Events owned by no partition are skipped.
pub fn loop_split(log: &ActivityLog, partitions: &Partitions) -> Vec<ActivityLog> {
    let mut sub_logs = vec![ActivityLog::new(); partitions.len()];
    for (trace, frequency) in log.iter() {
        let mut current: Option<usize> = None;
        let mut run = Vec::new();
        for activity in trace {
            let owner = partitions
                .iter()
                .position(|partition| partition.contains(activity));
            let Some(i) = owner else { continue };
            if let Some(c) = current {
                if c != i {
                    sub_logs[c].accumulate(std::mem::take(&mut run), frequency);
                }
            }
            current = Some(i);
            run.push(activity.clone());
        }
        if let Some(i) = current {
            sub_logs[i].accumulate(run, frequency);
        }
    }
    sub_logs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::activity_log::tests::log_of;
    use crate::event_log::activity_log::Activity;
    use std::collections::HashSet;

    fn partitions_of(sets: &[&[&str]]) -> Partitions {
        sets.iter()
            .map(|members| members.iter().map(|m| m.to_string()).collect::<HashSet<Activity>>())
            .collect()
    }

    #[test]
    fn exclusive_split_routes_whole_traces() {
        let log = log_of(&[(&["A", "B"], 2), (&["C"], 3), (&["A", "C"], 1)]);
        let partitions = partitions_of(&[&["A", "B"], &["C"]]);
        let sub_logs = exclusive_split(&log, &partitions);
        assert_eq!(sub_logs[0], log_of(&[(&["A", "B"], 2)]));
        // ("A", "C") spans both partitions and is dropped.
        assert_eq!(sub_logs[1], log_of(&[(&["C"], 3)]));
    }

    #[test]
    fn sequence_split_records_empty_sub_traces() {
        let log = log_of(&[(&["A", "B", "C"], 1), (&["A", "C"], 1)]);
        let partitions = partitions_of(&[&["A"], &["B"], &["C"]]);
        let sub_logs = sequence_split(&log, &partitions);
        assert_eq!(sub_logs[0], log_of(&[(&["A"], 2)]));
        // The second trace skips B, so its slot receives an empty trace.
        assert_eq!(sub_logs[1], log_of(&[(&["B"], 1), (&[], 1)]));
        assert_eq!(sub_logs[2], log_of(&[(&["C"], 2)]));
    }

    #[test]
    fn sequence_split_handles_out_of_order_events() {
        let log = log_of(&[(&["A", "B"], 3), (&["B", "A"], 1)]);
        let partitions = partitions_of(&[&["A"], &["B"]]);
        let sub_logs = sequence_split(&log, &partitions);
        assert_eq!(sub_logs[0], log_of(&[(&["A"], 4)]));
        assert_eq!(sub_logs[1], log_of(&[(&["B"], 4)]));
    }

    #[test]
    fn parallel_split_projects_traces() {
        let log = log_of(&[(&["A", "B", "C"], 1), (&["B", "C", "A"], 1)]);
        let partitions = partitions_of(&[&["A"], &["B", "C"]]);
        let sub_logs = parallel_split(&log, &partitions);
        assert_eq!(sub_logs[0], log_of(&[(&["A"], 2)]));
        assert_eq!(sub_logs[1], log_of(&[(&["B", "C"], 2)]));
    }

    #[test]
    fn parallel_split_records_empty_projection() {
        let log = log_of(&[(&["A"], 2)]);
        let partitions = partitions_of(&[&["A"], &["B"]]);
        let sub_logs = parallel_split(&log, &partitions);
        assert_eq!(sub_logs[0], log_of(&[(&["A"], 2)]));
        assert_eq!(sub_logs[1], log_of(&[(&[], 2)]));
    }

    #[test]
    fn loop_split_chops_traces_into_runs() {
        let log = log_of(&[
            (&["2", "3"], 2),
            (&["3", "2"], 5),
            (&["2", "3", "5", "6", "2", "3"], 3),
            (&["3", "2", "5", "6", "3", "2"], 1),
        ]);
        let partitions = partitions_of(&[&["2", "3"], &["5", "6"]]);
        let sub_logs = loop_split(&log, &partitions);
        // Every loop round contributes one body trace.
        assert_eq!(sub_logs[0], log_of(&[(&["2", "3"], 8), (&["3", "2"], 7)]));
        assert_eq!(sub_logs[1], log_of(&[(&["5", "6"], 4)]));
    }

    #[test]
    fn exclusive_split_replay_reconstructs_the_log() {
        let log = log_of(&[(&["A", "B"], 2), (&["B", "A"], 1), (&["C"], 3)]);
        let partitions = partitions_of(&[&["A", "B"], &["C"]]);
        let sub_logs = exclusive_split(&log, &partitions);
        // Every trace lands in exactly one sub-log, so their union is the log.
        let mut replayed = crate::event_log::activity_log::ActivityLog::new();
        for sub_log in &sub_logs {
            for (trace, frequency) in sub_log.iter() {
                replayed.accumulate(trace.clone(), frequency);
            }
        }
        assert_eq!(replayed, log);
    }

    #[test]
    fn sequence_split_replay_reconstructs_each_trace() {
        let log = log_of(&[(&["A", "B", "B", "C"], 4), (&["A", "C"], 1)]);
        let partitions = partitions_of(&[&["A"], &["B"], &["C"]]);
        for (trace, frequency) in log.iter() {
            let singleton: ActivityLog = [(trace.clone(), frequency)].into_iter().collect();
            let sub_logs = sequence_split(&singleton, &partitions);
            // Concatenating the sub-traces in partition order is the inverse
            // of the slicing; empty sub-traces contribute nothing.
            let replayed: Vec<Activity> = sub_logs
                .iter()
                .flat_map(|sub| sub.iter().next().expect("one sub-trace").0.clone())
                .collect();
            assert_eq!(&replayed, trace);
        }
    }

    #[test]
    fn parallel_split_replay_interleaves_back_into_each_trace() {
        let log = log_of(&[(&["A", "B", "C"], 1), (&["B", "C", "A"], 2)]);
        let partitions = partitions_of(&[&["A"], &["B", "C"]]);
        for (trace, frequency) in log.iter() {
            let singleton: ActivityLog = [(trace.clone(), frequency)].into_iter().collect();
            let sub_logs = parallel_split(&singleton, &partitions);
            let mut queues: Vec<std::collections::VecDeque<Activity>> = sub_logs
                .iter()
                .map(|sub| {
                    let (projection, _) = sub.iter().next().expect("one projection");
                    projection.iter().cloned().collect()
                })
                .collect();
            // Replaying the trace must consume every projection head in order.
            for activity in trace {
                let owner = partitions
                    .iter()
                    .position(|partition| partition.contains(activity))
                    .expect("every activity is owned");
                assert_eq!(queues[owner].pop_front().as_ref(), Some(activity));
            }
            assert!(queues.iter().all(|queue| queue.is_empty()));
        }
    }

    #[test]
    fn loop_split_replay_reassembles_the_unrolled_traces() {
        let log = log_of(&[(&["2", "3"], 2), (&["2", "3", "5", "6", "2", "3"], 3)]);
        let partitions = partitions_of(&[&["2", "3"], &["5", "6"]]);
        let sub_logs = loop_split(&log, &partitions);
        let body = vec!["2".to_string(), "3".to_string()];
        let redo = vec!["5".to_string(), "6".to_string()];
        // body, redo, body rebuilds the unrolled trace from sub-log pieces.
        let replayed: Vec<Activity> = [body.as_slice(), redo.as_slice(), body.as_slice()].concat();
        assert_eq!(log.frequency_of(&replayed), 3);
        // The sub-log frequencies are exactly what the replay consumes: one
        // body per plain trace, two bodies and one redo per unrolled trace.
        assert_eq!(sub_logs[0].frequency_of(&body), 2 + 2 * 3);
        assert_eq!(sub_logs[1].frequency_of(&redo), 3);
    }

    #[test]
    fn splits_conserve_events() {
        let log = log_of(&[
            (&["2", "3", "5", "6", "2", "3"], 3),
            (&["3", "2"], 5),
        ]);
        let event_count = |l: &crate::event_log::activity_log::ActivityLog| -> u64 {
            l.iter().map(|(t, f)| t.len() as u64 * f).sum()
        };
        let original = event_count(&log);
        for split in [
            sequence_split(&log, &partitions_of(&[&["2", "3"], &["5", "6"]])),
            parallel_split(&log, &partitions_of(&[&["2", "3"], &["5", "6"]])),
            loop_split(&log, &partitions_of(&[&["2", "3"], &["5", "6"]])),
        ] {
            let total: u64 = split.iter().map(event_count).sum();
            assert_eq!(total, original);
        }
    }

    #[test]
    fn loop_split_of_alternating_singletons() {
        let log = log_of(&[(&["A", "B", "A", "B", "A"], 1)]);
        let partitions = partitions_of(&[&["A"], &["B"]]);
        let sub_logs = loop_split(&log, &partitions);
        assert_eq!(sub_logs[0], log_of(&[(&["A"], 3)]));
        assert_eq!(sub_logs[1], log_of(&[(&["B"], 2)]));
    }
}
