use crate::cell::{
    CellState, ClaimDelta, CommitMode, ConflictMode, RESOURCE_EPSILON, SchedulerId,
};
use crate::error::CoreError;
use crate::sim::SimTime;

fn small_cell(conflict: ConflictMode, commit: CommitMode) -> CellState {
    CellState::new(2, 4.0, 8000.0, conflict, commit)
}

fn claim(machine: usize, seq_num: u64, cpus: f64, mem: f64) -> ClaimDelta {
    ClaimDelta {
        scheduler: SchedulerId(0),
        machine,
        seq_num,
        duration: Some(SimTime::from_secs(10)),
        cpus,
        mem,
    }
}

fn assert_aggregates_match_machines(cell: &CellState) {
    let mut cpus = 0.0;
    let mut mem = 0.0;
    for m in 0..cell.num_machines() {
        let occupied_cpus = cell.cpus_per_machine() - cell.available_cpus(m);
        let occupied_mem = cell.mem_per_machine() - cell.available_mem(m);
        assert!(occupied_cpus <= cell.cpus_per_machine() + RESOURCE_EPSILON);
        assert!(occupied_mem <= cell.mem_per_machine() + RESOURCE_EPSILON);
        cpus += occupied_cpus;
        mem += occupied_mem;
    }
    assert!((cpus - cell.total_occupied_cpus()).abs() < 1e-6);
    assert!((mem - cell.total_occupied_mem()).abs() < 1e-6);
}

#[test]
fn mode_strings_parse_per_the_construction_contract() {
    assert_eq!(
        ConflictMode::parse("sequence-numbers").expect("parse"),
        ConflictMode::SequenceNumbers
    );
    assert_eq!(
        ConflictMode::parse("resource-fit").expect("parse"),
        ConflictMode::ResourceFit
    );
    assert!(matches!(
        ConflictMode::parse("optimistic"),
        Err(CoreError::UnknownConflictMode(_))
    ));

    assert_eq!(
        CommitMode::parse("incremental").expect("parse"),
        CommitMode::Incremental
    );
    assert_eq!(
        CommitMode::parse("all-or-nothing").expect("parse"),
        CommitMode::AllOrNothing
    );
    assert!(matches!(
        CommitMode::parse("atomic"),
        Err(CoreError::UnknownCommitMode(_))
    ));
}

#[test]
fn apply_then_unapply_restores_prior_occupancy() {
    let mut cell = small_cell(ConflictMode::SequenceNumbers, CommitMode::Incremental);
    let base = claim(0, 0, 1.5, 3000.0);
    cell.apply(&base, false).expect("fits");

    let cpus_before = cell.total_occupied_cpus();
    let mem_before = cell.total_occupied_mem();
    let avail_before = (cell.available_cpus(1), cell.available_mem(1));

    let c = claim(1, 0, 2.0, 2500.0);
    cell.apply(&c, false).expect("fits");
    cell.unapply(&c);

    assert!((cell.total_occupied_cpus() - cpus_before).abs() < 1e-6);
    assert!((cell.total_occupied_mem() - mem_before).abs() < 1e-6);
    assert!((cell.available_cpus(1) - avail_before.0).abs() < 1e-6);
    assert!((cell.available_mem(1) - avail_before.1).abs() < 1e-6);
    assert_aggregates_match_machines(&cell);
}

#[test]
fn apply_rejects_claims_past_machine_capacity_and_leaves_state_unchanged() {
    let mut cell = small_cell(ConflictMode::SequenceNumbers, CommitMode::Incremental);
    cell.apply(&claim(0, 0, 3.0, 1000.0), false).expect("fits");

    let err = cell
        .apply(&claim(0, 1, 2.0, 1000.0), false)
        .expect_err("cpu overflow must fail");
    assert!(matches!(err, CoreError::CapacityViolation { machine: 0, .. }));

    // failed apply leaves occupancy and version untouched
    assert!((cell.total_occupied_cpus() - 3.0).abs() < 1e-6);
    assert!((cell.available_cpus(0) - 1.0).abs() < 1e-6);
    assert_eq!(cell.machine_seq_num(0), 1);
    assert_aggregates_match_machines(&cell);
}

#[test]
fn sequence_numbers_advance_only_on_unlocked_applies() {
    let mut cell = small_cell(ConflictMode::SequenceNumbers, CommitMode::Incremental);
    assert_eq!(cell.machine_seq_num(0), 0);

    cell.apply(&claim(0, 0, 1.0, 1000.0), false).expect("fits");
    assert_eq!(cell.machine_seq_num(0), 1);

    cell.apply(&claim(0, 1, 1.0, 1000.0), true).expect("fits");
    assert_eq!(cell.machine_seq_num(0), 1, "locked apply keeps the version");

    cell.unapply(&claim(0, 1, 1.0, 1000.0));
    assert_eq!(cell.machine_seq_num(0), 1, "unapply keeps the version");

    cell.apply(&claim(0, 1, 1.0, 1000.0), false).expect("fits");
    assert_eq!(cell.machine_seq_num(1), 0, "other machines unaffected");
    assert_eq!(cell.machine_seq_num(0), 2);
}

#[test]
fn available_resources_never_go_negative() {
    let mut cell = small_cell(ConflictMode::SequenceNumbers, CommitMode::Incremental);
    // unapplying a claim that was never applied truncates at zero
    cell.unapply(&claim(0, 0, 2.0, 2000.0));
    assert!(cell.available_cpus(0) <= cell.cpus_per_machine());
    assert!((cell.total_occupied_cpus() - 0.0).abs() < 1e-6);
    assert!((cell.available_cpus(0) - 4.0).abs() < 1e-6);
}

#[test]
fn sequence_number_conflict_detection_compares_stored_versions() {
    let mut cell = small_cell(ConflictMode::SequenceNumbers, CommitMode::Incremental);
    let stale = claim(0, 0, 1.0, 1000.0);
    assert!(!cell.causes_conflict(&stale));

    // a concurrent commit bumps the version; the stored seq no longer matches
    cell.apply(&claim(0, 0, 0.5, 500.0), false).expect("fits");
    assert!(cell.causes_conflict(&stale));

    let fresh = claim(0, cell.machine_seq_num(0), 1.0, 1000.0);
    assert!(!cell.causes_conflict(&fresh));
}

#[test]
fn resource_fit_conflict_detection_ignores_versions() {
    let mut cell = small_cell(ConflictMode::ResourceFit, CommitMode::Incremental);
    cell.apply(&claim(0, 0, 3.5, 500.0), false).expect("fits");

    // version is stale but the machine still fits the claim
    let fits = claim(0, 0, 0.5, 1000.0);
    assert!(!cell.causes_conflict(&fits));

    let too_big = claim(0, 0, 1.0, 1000.0);
    assert!(cell.causes_conflict(&too_big));
}

#[test]
fn incremental_commit_keeps_valid_claims_and_drops_stale_ones() {
    let mut cell = small_cell(ConflictMode::SequenceNumbers, CommitMode::Incremental);
    let stale = claim(0, 0, 1.0, 1000.0);
    cell.apply(&claim(0, 0, 0.5, 500.0), false).expect("fits");

    let valid = claim(1, cell.machine_seq_num(1), 1.0, 1000.0);
    let result = cell.commit(vec![stale, valid]);

    assert_eq!(result.committed.len(), 1);
    assert_eq!(result.committed[0].machine, 1);
    assert_eq!(result.conflicted.len(), 1);
    assert_eq!(result.conflicted[0].machine, 0);

    // only the valid claim landed on the ledger
    assert!((cell.total_occupied_cpus() - 1.5).abs() < 1e-6);
    assert_eq!(cell.machine_seq_num(1), 1);
    assert_aggregates_match_machines(&cell);
}

#[test]
fn all_or_nothing_commit_rolls_back_the_whole_batch_on_any_conflict() {
    let mut cell = small_cell(ConflictMode::SequenceNumbers, CommitMode::AllOrNothing);
    cell.apply(&claim(0, 0, 0.5, 500.0), false).expect("fits");

    let cpus_before = cell.total_occupied_cpus();
    let mem_before = cell.total_occupied_mem();

    let valid_a = claim(1, cell.machine_seq_num(1), 1.0, 1000.0);
    let stale = claim(0, 0, 1.0, 1000.0);
    let valid_b = claim(1, cell.machine_seq_num(1), 1.0, 1000.0);
    let result = cell.commit(vec![valid_a, stale, valid_b]);

    assert!(result.committed.is_empty());
    assert_eq!(result.conflicted.len(), 3);
    assert!((cell.total_occupied_cpus() - cpus_before).abs() < 1e-6);
    assert!((cell.total_occupied_mem() - mem_before).abs() < 1e-6);
    assert_aggregates_match_machines(&cell);
}

#[test]
fn all_or_nothing_commit_applies_a_fully_valid_batch() {
    let mut cell = small_cell(ConflictMode::SequenceNumbers, CommitMode::AllOrNothing);
    let a = claim(0, 0, 1.0, 1000.0);
    let b = claim(1, 0, 2.0, 2000.0);
    let result = cell.commit(vec![a, b]);

    assert_eq!(result.committed.len(), 2);
    assert!(result.conflicted.is_empty());
    assert!((cell.total_occupied_cpus() - 3.0).abs() < 1e-6);
    assert_eq!(cell.machine_seq_num(0), 1);
    assert_eq!(cell.machine_seq_num(1), 1);
}

#[test]
fn deep_copies_never_alias_the_original_ledger() {
    let mut cell = small_cell(ConflictMode::SequenceNumbers, CommitMode::Incremental);
    let mut shadow = cell.clone();

    shadow.apply(&claim(0, 0, 2.0, 2000.0), false).expect("fits");
    assert!((cell.total_occupied_cpus() - 0.0).abs() < 1e-6);
    assert_eq!(cell.machine_seq_num(0), 0);

    cell.apply(&claim(1, 0, 1.0, 1000.0), false).expect("fits");
    assert!((shadow.available_cpus(1) - 4.0).abs() < 1e-6);
}
