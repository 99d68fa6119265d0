use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use taskboard_core::board::{Board, Move};
use taskboard_core::task::{Task, View};
use taskboard_shared::TaskPatch;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
        .single()
        .expect("valid now")
}

fn task(id: &str, title: &str) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
        date: "2026-03-01".to_string(),
        time: "09:30 AM".to_string(),
        completed: false,
    }
}

fn ids(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|task| task.id.as_str()).collect()
}

/// Board with `c` on top, then `b`, then `a`; `b` is completed.
fn board_abc() -> Board {
    let mut board = Board::empty(true);
    for id in ["a", "b", "c"] {
        board.add(task(id, id), now());
    }
    board.update("b", &TaskPatch::completed_only(true));
    board
}

#[test]
fn add_on_empty_board_fills_all_and_active() {
    let mut board = Board::empty(false);
    let added = board.add(
        Task {
            id: "1".to_string(),
            title: "x".to_string(),
            date: String::new(),
            time: String::new(),
            completed: true,
        },
        now(),
    );

    assert!(!added.completed);
    assert!(!added.date.is_empty());
    assert!(!added.time.is_empty());
    assert_eq!(board.all(), std::slice::from_ref(&added));
    assert_eq!(board.active(), std::slice::from_ref(&added));
    assert!(board.completed().is_empty());
    assert!(board.check_invariants().is_ok());
}

#[test]
fn completing_moves_task_between_partitions() {
    let mut board = Board::empty(true);
    let a = board.add(task("a", "water plants"), now());

    let done = board
        .update("a", &TaskPatch::completed_only(true))
        .expect("known task");
    assert!(board.active().is_empty());
    assert_eq!(board.completed(), std::slice::from_ref(&done));
    assert_eq!(board.all(), std::slice::from_ref(&done));
    assert_eq!(done.title, a.title);
    assert_eq!(done.date, a.date);

    board.update("a", &TaskPatch::completed_only(false));
    assert_eq!(board.active(), std::slice::from_ref(&a));
    assert!(board.completed().is_empty());
}

#[test]
fn add_then_delete_restores_previous_board() {
    let mut board = board_abc();
    let before = board.clone();

    board.add(task("z", "temporary"), now());
    assert!(board.delete("z"));
    assert_eq!(board, before);
    assert!(!board.delete("z"));
}

#[test]
fn update_of_unknown_task_is_ignored() {
    let mut board = board_abc();
    let before = board.clone();
    assert!(board.update("missing", &TaskPatch::completed_only(true)).is_none());
    assert_eq!(board, before);
}

#[test]
fn blank_patch_fields_keep_stored_values() {
    let mut board = board_abc();
    let patch = TaskPatch {
        title: Some("  ".to_string()),
        date: Some(String::new()),
        time: Some("10:00 AM".to_string()),
        completed: None,
    };
    let updated = board.update("a", &patch).expect("known task");
    assert_eq!(updated.title, "a");
    assert_eq!(updated.date, "2026-03-01");
    assert_eq!(updated.time, "10:00 AM");
}

#[test]
fn reorder_within_view_onto_same_index_changes_nothing() {
    let mut board = board_abc();
    let before = board.clone();
    for view in View::EVERY {
        let reordered = board.reorder(Move {
            source: view,
            source_index: 0,
            destination: view,
            destination_index: 0,
        });
        assert!(reordered.is_some_and(|r| !r.completion_changed));
    }
    assert_eq!(board, before);
}

#[test]
fn reorder_within_view_moves_element_only() {
    let mut board = board_abc();
    board.reorder(Move {
        source: View::All,
        source_index: 0,
        destination: View::All,
        destination_index: 5,
    });
    assert_eq!(ids(board.all()), vec!["b", "a", "c"]);
    assert!(board.check_invariants().is_ok());
}

#[test]
fn reorder_out_of_range_source_is_a_no_op() {
    let mut board = board_abc();
    let before = board.clone();
    let reordered = board.reorder(Move {
        source: View::Completed,
        source_index: 4,
        destination: View::Active,
        destination_index: 0,
    });
    assert!(reordered.is_none());
    assert_eq!(board, before);
}

#[test]
fn reorder_onto_completed_flips_exactly_one_task() {
    let mut board = board_abc();
    let before = board.clone();

    let reordered = board
        .reorder(Move {
            source: View::Active,
            source_index: 0,
            destination: View::Completed,
            destination_index: 1,
        })
        .expect("source exists");

    assert_eq!(reordered.task.id, "c");
    assert!(reordered.task.completed);
    assert!(reordered.completion_changed);
    assert_eq!(ids(board.active()), vec!["a"]);
    assert_eq!(ids(board.completed()), vec!["b", "c"]);
    assert_eq!(ids(board.all()), ids(before.all()));

    for (after, prior) in board.all().iter().zip(before.all()) {
        if after.id == "c" {
            assert_eq!(after.title, prior.title);
            assert_ne!(after.completed, prior.completed);
        } else {
            assert_eq!(after, prior);
        }
    }
    assert!(board.check_invariants().is_ok());
}

#[test]
fn reorder_from_all_onto_active_clears_the_flag() {
    let mut board = board_abc();
    let reordered = board
        .reorder(Move {
            source: View::All,
            source_index: 1,
            destination: View::Active,
            destination_index: 0,
        })
        .expect("source exists");

    assert_eq!(reordered.task.id, "b");
    assert!(!reordered.task.completed);
    assert_eq!(ids(board.active()), vec!["b", "c", "a"]);
    assert!(board.completed().is_empty());
    assert!(board.check_invariants().is_ok());
}

#[test]
fn reorder_onto_all_keeps_the_flag_and_partitions() {
    let mut board = board_abc();
    let reordered = board
        .reorder(Move {
            source: View::Completed,
            source_index: 0,
            destination: View::All,
            destination_index: 0,
        })
        .expect("source exists");

    assert!(reordered.task.completed);
    assert!(!reordered.completion_changed);
    assert_eq!(ids(board.all()), vec!["b", "c", "a"]);
    assert_eq!(ids(board.completed()), vec!["b"]);
    assert!(board.check_invariants().is_ok());
}

#[test]
fn replace_all_marks_synced_and_initialized() {
    let mut board = Board::empty(true);
    let mut one = task("1", "done already");
    one.completed = true;
    let two = task("2", "still open");
    board.replace_all(
        vec![one.clone(), two.clone()],
        vec![two],
        vec![one],
        now(),
    );
    assert_eq!(board.last_sync(), Some(now()));
    assert!(board.is_initialized());
    assert_eq!(ids(board.active()), vec!["2"]);
    assert_eq!(ids(board.completed()), vec!["1"]);
}

#[test]
fn invariant_check_spots_overlap_and_repartition_repairs_it() {
    let mut broken: Board = serde_json::from_value(serde_json::json!({
        "all": [{ "id": "1", "title": "x", "completed": false }],
        "active": [{ "id": "1", "title": "x", "completed": false }],
        "completed": [{ "id": "1", "title": "x", "completed": false }],
    }))
    .expect("decode board");

    assert!(broken.check_invariants().is_err());
    broken.repartition();
    assert!(broken.check_invariants().is_ok());
    assert_eq!(ids(broken.active()), vec!["1"]);
}

#[derive(Debug, Clone)]
enum Op {
    Add,
    Delete(usize),
    Toggle(usize),
    Retitle(usize),
    Reorder(View, usize, View, usize),
}

fn view() -> impl Strategy<Value = View> {
    prop_oneof![Just(View::All), Just(View::Active), Just(View::Completed)]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Add),
        1 => (0usize..8).prop_map(Op::Delete),
        2 => (0usize..8).prop_map(Op::Toggle),
        1 => (0usize..8).prop_map(Op::Retitle),
        3 => (view(), 0usize..8, view(), 0usize..8)
            .prop_map(|(s, si, d, di)| Op::Reorder(s, si, d, di)),
    ]
}

fn pick(board: &Board, index: usize) -> Option<String> {
    let all = board.all();
    if all.is_empty() {
        return None;
    }
    Some(all[index % all.len()].id.clone())
}

proptest! {
    #[test]
    fn partitions_hold_for_any_operation_sequence(ops in prop::collection::vec(op(), 0..40)) {
        let mut board = Board::empty(true);
        let mut next_id = 0u32;

        for op in ops {
            match op {
                Op::Add => {
                    next_id += 1;
                    board.add(task(&next_id.to_string(), "generated"), now());
                }
                Op::Delete(i) => {
                    if let Some(id) = pick(&board, i) {
                        board.delete(&id);
                    }
                }
                Op::Toggle(i) => {
                    if let Some(id) = pick(&board, i) {
                        let completed = board.find(&id).is_some_and(|t| t.completed);
                        board.update(&id, &TaskPatch::completed_only(!completed));
                    }
                }
                Op::Retitle(i) => {
                    if let Some(id) = pick(&board, i) {
                        board.update(&id, &TaskPatch {
                            title: Some(format!("renamed {id}")),
                            ..TaskPatch::default()
                        });
                    }
                }
                Op::Reorder(source, source_index, destination, destination_index) => {
                    board.reorder(Move { source, source_index, destination, destination_index });
                }
            }

            prop_assert!(board.check_invariants().is_ok());

            let active: HashSet<&str> = ids(board.active()).into_iter().collect();
            let completed: HashSet<&str> = ids(board.completed()).into_iter().collect();
            let all: HashSet<&str> = ids(board.all()).into_iter().collect();
            prop_assert!(active.is_disjoint(&completed));
            let union: HashSet<&str> = active.union(&completed).copied().collect();
            prop_assert_eq!(union, all);
        }
    }

    #[test]
    fn cross_view_reorder_touches_one_task(
        toggles in prop::collection::vec(any::<bool>(), 1..6),
        source in view(),
        destination in view(),
        source_index in 0usize..6,
        destination_index in 0usize..6,
    ) {
        prop_assume!(source != destination);

        let mut board = Board::empty(true);
        for (i, done) in toggles.iter().enumerate() {
            let id = i.to_string();
            board.add(task(&id, "generated"), now());
            if *done {
                board.update(&id, &TaskPatch::completed_only(true));
            }
        }
        let before = board.clone();

        if let Some(reordered) = board.reorder(Move { source, source_index, destination, destination_index }) {
            let changed: Vec<&Task> = board
                .all()
                .iter()
                .filter(|task| before.find(&task.id) != Some(*task))
                .collect();
            prop_assert!(changed.len() <= 1);
            if destination != View::All {
                prop_assert_eq!(reordered.task.completed, destination == View::Completed);
            }
            prop_assert!(board.check_invariants().is_ok());
        } else {
            prop_assert_eq!(board, before);
        }
    }
}
