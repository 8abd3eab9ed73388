use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use umbra_looper::{LooperConfig, Scheduler};

#[derive(Clone, Copy, Debug)]
enum Post {
    Delayed(u64),
    Front,
}

fn post_strategy() -> impl Strategy<Value = Post> {
    prop_oneof![4 => (0u64..50).prop_map(Post::Delayed), 1 => Just(Post::Front)]
}

fn paused_scheduler() -> Arc<Scheduler> {
    Arc::new(Scheduler::new(&LooperConfig::new().paused(true)))
}

// Property: draining runs tasks by execution time, then insertion order, with
// front posts ahead of their instant in reverse posting order.
proptest! {
    #[test]
    fn prop_drain_order_matches_time_then_sequence(posts in prop::collection::vec(post_strategy(), 1..40)) {
        let scheduler = paused_scheduler();
        let ran = Arc::new(Mutex::new(Vec::new()));
        let mut expected = Vec::new();
        let mut normal = 0i64;
        let mut front = 0i64;

        for (label, post) in posts.iter().enumerate() {
            let sink = Arc::clone(&ran);
            let task = Box::new(move || sink.lock().unwrap().push(label));
            match *post {
                Post::Delayed(delay) => {
                    prop_assert!(scheduler.post(task, delay));
                    expected.push(((delay, normal), label));
                    normal += 1;
                }
                Post::Front => {
                    prop_assert!(scheduler.post_at_front(task));
                    front -= 1;
                    expected.push(((0, front), label));
                }
            }
        }
        expected.sort_by_key(|(key, _)| *key);

        scheduler.advance_to_last_posted_runnable();
        let order: Vec<usize> = expected.into_iter().map(|(_, label)| label).collect();
        prop_assert_eq!(ran.lock().unwrap().clone(), order);
        prop_assert_eq!(scheduler.size(), 0);
    }

    #[test]
    fn prop_tasks_observe_their_own_execution_time(
        delays in prop::collection::vec(0u64..200, 1..30),
        steps in prop::collection::vec(0u64..60, 1..10),
    ) {
        let scheduler = paused_scheduler();
        let observed = Arc::new(Mutex::new(Vec::new()));
        for delay in &delays {
            let clock = Arc::clone(&scheduler);
            let sink = Arc::clone(&observed);
            let delay = *delay;
            scheduler.post(Box::new(move || sink.lock().unwrap().push((delay, clock.current_time()))), delay);
        }

        let mut elapsed = 0;
        for step in &steps {
            scheduler.advance_by(*step);
            elapsed += step;
            prop_assert_eq!(scheduler.current_time(), elapsed);
            let due = delays.iter().filter(|delay| **delay <= elapsed).count();
            prop_assert_eq!(observed.lock().unwrap().len(), due);
        }
        for (delay, seen_at) in observed.lock().unwrap().iter() {
            prop_assert_eq!(delay, seen_at);
        }
    }

    #[test]
    fn prop_repeated_zero_advance_is_idempotent(delays in prop::collection::vec(0u64..5, 0..20)) {
        let scheduler = paused_scheduler();
        for delay in &delays {
            scheduler.post(Box::new(|| {}), *delay);
        }
        let zero_delay = delays.iter().filter(|delay| **delay == 0).count();
        prop_assert_eq!(scheduler.advance_by(0), zero_delay);
        prop_assert_eq!(scheduler.advance_by(0), 0);
        prop_assert_eq!(scheduler.size(), delays.len() - zero_delay);
    }
}
