mod common;

use common::{counted, ms, timed, Recorder};
use pulse_stream::*;
use quickcheck::{quickcheck, TestResult};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

type Nested = Stream<Stream<&'static str, VirtualEnv>, VirtualEnv>;

/// A arrives at t=0 and emits a1@10, a2@20; B arrives at t=1 and emits b1
/// 5ms after it starts.
fn a_then_b() -> Nested {
    let a = timed(vec![(10, "a1"), (20, "a2")]);
    let b = timed(vec![(5, "b1")]);
    merge(vec![at(ms(0), a), at(ms(1), b)])
}

fn run_join(config: JoinConfig) -> Vec<&'static str> {
    let env = VirtualEnv::new();
    let joined = join(a_then_b(), config);
    let result = env.block_on(collect(&joined, &env));
    match result {
        Some(Ok(values)) => values,
        other => panic!("join did not settle: {:?}", other),
    }
}

#[test]
fn test_hold_queues_until_slot_frees() {
    assert_eq!(run_join(JoinConfig::sequential()), vec!["a1", "a2", "b1"]);
}

#[test]
fn test_drop_ignores_inner_while_busy() {
    assert_eq!(run_join(JoinConfig::exhausting()), vec!["a1", "a2"]);
}

#[test]
fn test_swap_preempts_oldest() {
    assert_eq!(run_join(JoinConfig::switching()), vec!["b1"]);
}

#[test]
fn test_two_slots_run_both() {
    let config = JoinConfig::new().concurrency(Concurrency::bounded(2).unwrap());
    assert_eq!(run_join(config), vec!["b1", "a1", "a2"]);
}

#[test]
fn test_queued_start_order_is_fifo() {
    let env = VirtualEnv::new();
    let inner = |name: &'static str| timed(vec![(10, name)]);
    let nested: Nested = from_iter(vec![inner("first"), inner("second"), inner("third")]);
    let joined = join(nested, JoinConfig::sequential());

    let rec = Recorder::new();
    let _d = joined.run(rec.sink(), &env);
    env.advance(ms(10));
    assert_eq!(rec.values(), vec!["first"]);
    env.advance(ms(10));
    assert_eq!(rec.values(), vec!["first", "second"]);
    env.advance(ms(10));
    assert_eq!(rec.values(), vec!["first", "second", "third"]);
    assert_eq!(rec.end_count(), 1);
}

#[test]
fn test_end_waits_for_inner_after_outer_ends() {
    let env = VirtualEnv::new();
    let nested: Nested = from_iter(vec![timed(vec![(30, "late")])]);
    let rec = Recorder::new();
    let _d = join(nested, JoinConfig::default()).run(rec.sink(), &env);

    env.advance(ms(29));
    assert!(!rec.ended());
    env.advance(ms(1));
    assert_eq!(rec.values(), vec!["late"]);
    assert_eq!(rec.end_count(), 1);
}

#[test]
fn test_end_waits_for_outer_after_inners_end() {
    let env = VirtualEnv::new();
    let (dispatch, outer) = create_adapter::<Stream<i32, VirtualEnv>, VirtualEnv>();
    let rec = Recorder::new();
    let _d = join(outer, JoinConfig::default()).run(rec.sink(), &env);

    dispatch.dispatch(from_iter(vec![1, 2]));
    assert_eq!(rec.values(), vec![1, 2]);
    assert!(!rec.ended());

    dispatch.end();
    assert_eq!(rec.end_count(), 1);
}

#[test]
fn test_dispose_releases_outer_and_running_inners() {
    let env = VirtualEnv::new();
    let (inner_a, _, a_disposed) = counted(never::<i32, VirtualEnv>());
    let (inner_b, _, b_disposed) = counted(never::<i32, VirtualEnv>());
    let (outer, _, outer_disposed) = counted(merge(vec![
        from_iter(vec![inner_a, inner_b]),
        never(),
    ]));

    let rec = Recorder::new();
    let d = join(outer, JoinConfig::default()).run(rec.sink(), &env);
    d.dispose();
    d.dispose();

    assert_eq!(outer_disposed.get(), 1);
    assert_eq!(a_disposed.get(), 1);
    assert_eq!(b_disposed.get(), 1);
    assert!(!rec.ended());
}

#[test]
fn test_dispose_clears_queue_without_running_it() {
    let env = VirtualEnv::new();
    let (queued, queued_runs, _) = counted(timed(vec![(5, 2)]));
    let nested = from_iter(vec![timed(vec![(50, 1)]), queued]);
    let rec = Recorder::new();
    let d = join(nested, JoinConfig::sequential()).run(rec.sink(), &env);

    env.advance(ms(10));
    d.dispose();
    env.advance(ms(100));

    assert_eq!(queued_runs.get(), 0);
    assert!(rec.values().is_empty());
    assert!(!rec.ended());
    assert_eq!(env.pending_timers(), 0);
}

#[test]
fn test_swap_disposes_evicted_inner() {
    let env = VirtualEnv::new();
    let (first, _, first_disposed) = counted(timed(vec![(10, "old")]));
    let nested: Nested = merge(vec![at(ms(0), first), at(ms(5), timed(vec![(10, "new")]))]);
    let joined = join(nested, JoinConfig::switching());

    assert_eq!(env.block_on(collect(&joined, &env)), Some(Ok(vec!["new"])));
    assert_eq!(first_disposed.get(), 1);
}

#[test]
fn test_switch_map_keeps_latest() {
    let env = VirtualEnv::new();
    let source = timed(vec![(0, 1), (5, 2), (30, 3)]);
    let switched = source.switch_map(|n| timed(vec![(10, n * 10), (20, n * 100)]));
    let result = env.block_on(collect(&switched, &env));
    assert_eq!(result, Some(Ok(vec![20, 200, 30, 300])));
}

#[test]
fn test_exhaust_map_ignores_while_busy() {
    let env = VirtualEnv::new();
    let source = timed(vec![(0, 1), (5, 2), (30, 3)]);
    let exhausted = source.exhaust_map(|n| timed(vec![(10, n * 10), (20, n * 100)]));
    let result = env.block_on(collect(&exhausted, &env));
    assert_eq!(result, Some(Ok(vec![10, 100, 30, 300])));
}

#[test]
fn test_concat_map_preserves_order() {
    let env = VirtualEnv::new();
    let source: Stream<u64, VirtualEnv> = from_iter(vec![30, 10]);
    let concatenated = source.concat_map(|delay| timed(vec![(delay, delay)]));
    let result = env.block_on(collect(&concatenated, &env));
    assert_eq!(result, Some(Ok(vec![30, 10])));
}

#[test]
fn test_flat_map_interleaves_by_time() {
    let env = VirtualEnv::new();
    let source: Stream<u64, VirtualEnv> = from_iter(vec![30, 10]);
    let flattened = source.flat_map(|delay| timed(vec![(delay, delay)]));
    let result = env.block_on(collect(&flattened, &env));
    assert_eq!(result, Some(Ok(vec![10, 30])));
}

#[test]
fn test_inner_end_reason_carried_to_final_end() {
    let failing: Stream<i32> = Stream::new(|sink: SinkRef<i32>, _env: &()| {
        sink.event(1);
        sink.end(Some(StreamError::custom("inner failed")));
        Disposable::noop()
    });
    let merged = merge(vec![failing, from_iter(vec![2, 3])]);
    let rec = Recorder::new();
    merged.run(rec.sink(), &());

    assert_eq!(rec.values(), vec![1, 2, 3]);
    assert_eq!(rec.end_count(), 1);
    assert_eq!(rec.end_reason(), Some(StreamError::custom("inner failed")));
}

#[test]
fn test_take_downstream_of_join_stops_everything() {
    let env = VirtualEnv::new();
    let ticks = periodic::<VirtualEnv>(ms(10)).map(|_| 1);
    let merged = merge(vec![ticks.clone(), ticks]).take(3);
    let result = env.block_on(collect(&merged, &env));

    assert_eq!(result, Some(Ok(vec![1, 1, 1])));
    assert_eq!(env.pending_timers(), 0);
}

#[test]
fn test_combine_emits_latest_pair() {
    let env = VirtualEnv::new();
    let letters = timed(vec![(0, 'a'), (20, 'b')]);
    let numbers = timed(vec![(10, 1), (30, 2)]);
    let combined = combine(letters, numbers, |l, n| format!("{}{}", l, n));
    let result = env.block_on(collect(&combined, &env));
    assert_eq!(
        result,
        Some(Ok(vec!["a1".to_string(), "b1".to_string(), "b2".to_string()]))
    );
}

fn increment(x: i32) -> i32 {
    x + 1
}

fn tenfold(x: i32) -> i32 {
    x * 10
}

#[test]
fn test_apply_uses_latest_function() {
    let env = VirtualEnv::new();
    let functions = timed(vec![
        (0, increment as fn(i32) -> i32),
        (15, tenfold as fn(i32) -> i32),
    ]);
    let values = timed(vec![(5, 1), (10, 2)]);
    let applied = apply(functions, values);
    let result = env.block_on(collect(&applied, &env));
    assert_eq!(result, Some(Ok(vec![2, 3, 20])));
}

fn strategy_from(n: u8) -> OverflowStrategy {
    match n % 3 {
        0 => OverflowStrategy::Hold,
        1 => OverflowStrategy::Swap,
        _ => OverflowStrategy::Drop,
    }
}

#[test]
fn prop_synchronous_inners_flatten_in_order() {
    fn prop(groups: Vec<Vec<u8>>, limit: u8, strategy: u8) -> TestResult {
        let limit = match Concurrency::bounded(limit as usize % 4) {
            Ok(c) => c,
            Err(_) => return TestResult::discard(),
        };
        let config = JoinConfig::new().concurrency(limit).strategy(strategy_from(strategy));
        let nested: Stream<Stream<u8>> = from_iter(
            groups
                .iter()
                .cloned()
                .map(from_iter)
                .collect::<Vec<Stream<u8>>>(),
        );

        let rec = Recorder::new();
        join(nested, config).run(rec.sink(), &());

        let expected: Vec<u8> = groups.into_iter().flatten().collect();
        TestResult::from_bool(rec.values() == expected && rec.end_count() == 1)
    }
    quickcheck(prop as fn(Vec<Vec<u8>>, u8, u8) -> TestResult);
}

#[test]
fn test_disposing_after_completion_is_harmless() {
    let env = VirtualEnv::new();
    let rec = Recorder::new();
    let d = join(a_then_b(), JoinConfig::default()).run(rec.sink(), &env);
    env.advance(Duration::from_secs(1));
    assert_eq!(rec.end_count(), 1);

    d.dispose();
    assert_eq!(rec.end_count(), 1);
}

#[test]
fn test_long_queue_of_synchronous_inners() {
    let env = VirtualEnv::new();
    let mut inners: Vec<Stream<u32, VirtualEnv>> = vec![at(ms(1), 0)];
    inners.extend((1..=50_000).map(|i| from_iter(vec![i])));
    let concatenated = join(from_iter(inners), JoinConfig::sequential());

    let result = env.block_on(collect(&concatenated, &env));
    let values = match result {
        Some(Ok(values)) => values,
        other => panic!("join did not settle: {:?}", other.map(|r| r.map(|v| v.len()))),
    };
    assert_eq!(values.len(), 50_001);
    assert_eq!(values.last(), Some(&50_000));
}

#[test]
fn test_inner_panicking_in_run_does_not_block_end() {
    let env = VirtualEnv::new();
    let (dispatch, outer) = create_adapter::<Stream<i32, VirtualEnv>, VirtualEnv>();
    let rec = Recorder::new();
    let _d = join(outer, JoinConfig::default()).run(rec.sink(), &env);

    let exploding: Stream<i32, VirtualEnv> =
        Stream::new(|_sink: SinkRef<i32>, _env: &VirtualEnv| panic!("inner failed to start"));
    let outcome = catch_unwind(AssertUnwindSafe(|| dispatch.dispatch(exploding)));
    assert!(outcome.is_err());

    dispatch.dispatch(from_iter(vec![1]));
    dispatch.end();
    assert_eq!(rec.values(), vec![1]);
    assert_eq!(rec.end_count(), 1);
}
