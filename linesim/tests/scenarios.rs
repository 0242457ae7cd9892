use linesim::{
    JobId, JobState, LineConfig, MachineConfig, MachineId, Outcome, Simulation, Snapshot,
    Transition,
};
use quickcheck_macros::quickcheck;
use rstest::rstest;

fn line(p1: f64, p2: f64) -> LineConfig {
    LineConfig {
        machines: vec![
            MachineConfig {
                id: MachineId::from(1),
                success_probability: p1,
                mean_service: 30.0,
            },
            MachineConfig {
                id: MachineId::from(2),
                success_probability: p2,
                mean_service: 50.0,
            },
        ],
        stop_limit: 100,
        ..LineConfig::default()
    }
}

fn run_all(config: &LineConfig) -> (Simulation, Vec<Snapshot>) {
    let mut simulation = Simulation::new(config).unwrap();
    let mut snapshots = Vec::new();
    while let Some(snapshot) = simulation.step() {
        assert_eq!(simulation.scheduler().audit(), Ok(()));
        snapshots.push(snapshot);
    }
    (simulation, snapshots)
}

fn transitions(snapshots: &[Snapshot]) -> impl Iterator<Item = &Transition> {
    snapshots.iter().flat_map(|s| s.transitions.iter())
}

#[rstest(seed, case(1), case(100), case(2021))]
fn test_perfect_machines(seed: u64) {
    let config = LineConfig {
        seed,
        ..line(1.0, 1.0)
    };
    let (simulation, snapshots) = run_all(&config);
    assert!(simulation.completed() >= 100);
    assert_eq!(simulation.broken(), 0);
    assert_eq!(simulation.scrapped(), 0);
    assert!(transitions(&snapshots).all(|t| t.to != JobState::WaitingForRepair));
}

#[rstest(seed, case(1), case(100), case(2021))]
fn test_broken_machines(seed: u64) {
    let config = LineConfig {
        seed,
        ..line(0.0, 0.0)
    };
    let (simulation, snapshots) = run_all(&config);
    assert_eq!(simulation.completed(), 0);
    assert_eq!(simulation.broken(), 0);
    assert!(simulation.scrapped() >= 100);
    let scrapped = transitions(&snapshots)
        .filter(|t| t.to == JobState::Terminated(Outcome::Scrapped))
        .count();
    assert_eq!(scrapped, simulation.scrapped());
}

#[test]
fn test_single_job() {
    let config = LineConfig {
        first_arrival: Some(0.0),
        max_arrivals: Some(1),
        stop_limit: 1,
        ..line(1.0, 1.0)
    };
    let (simulation, snapshots) = run_all(&config);
    assert_eq!(snapshots.len(), 2);
    let states: Vec<_> = transitions(&snapshots)
        .inspect(|t| assert_eq!(t.job, JobId::from(0)))
        .map(|t| t.to)
        .collect();
    assert_eq!(
        states,
        vec![
            JobState::WaitingForStage1,
            JobState::InProcess {
                machine: MachineId::from(1)
            },
            JobState::Terminated(Outcome::Completed),
        ]
    );
    assert_eq!(simulation.total(), 1);
    assert_eq!(simulation.completed(), 1);
    assert_eq!(simulation.broken(), 0);
    assert_eq!(simulation.scrapped(), 0);
    assert!(simulation.future_queue().is_empty());
    assert!(simulation.backlog().is_empty());
}

#[test]
fn test_repair_counts_as_broken() {
    let config = LineConfig {
        first_arrival: Some(0.0),
        max_arrivals: Some(1),
        stop_limit: 1,
        ..line(0.0, 1.0)
    };
    let (simulation, snapshots) = run_all(&config);
    let states: Vec<_> = transitions(&snapshots).map(|t| t.to).collect();
    assert_eq!(
        states,
        vec![
            JobState::WaitingForStage1,
            JobState::InProcess {
                machine: MachineId::from(1)
            },
            JobState::WaitingForRepair,
            JobState::InProcess {
                machine: MachineId::from(2)
            },
            JobState::Terminated(Outcome::Broken),
        ]
    );
    assert_eq!(simulation.completed(), 1);
    assert_eq!(simulation.broken(), 1);
}

#[test]
fn test_default_line() {
    let (simulation, _) = run_all(&LineConfig::default());
    let counters = simulation.counters();
    assert!(counters.terminated() >= 500);
    assert!(counters.broken() <= counters.completed());
    assert!(counters.total() > counters.terminated());
}

#[test]
fn test_deterministic() {
    let config = LineConfig {
        stop_limit: 50,
        ..LineConfig::default()
    };
    let (first, first_snapshots) = run_all(&config);
    let (second, second_snapshots) = run_all(&config);
    assert_eq!(first_snapshots, second_snapshots);
    assert_eq!(
        serde_json::to_string(&first.summary()).unwrap(),
        serde_json::to_string(&second.summary()).unwrap()
    );
}

#[quickcheck]
fn prop_consistent_run(seed: u64) -> bool {
    let config = LineConfig {
        seed,
        stop_limit: 30,
        ..LineConfig::default()
    };
    let (simulation, snapshots) = run_all(&config);
    let counters = simulation.counters();
    let terminated = transitions(&snapshots)
        .filter(|t| matches!(t.to, JobState::Terminated(_)))
        .count();
    let times_ordered = snapshots.windows(2).all(|w| w[0].time <= w[1].time);
    let defects_bounded = snapshots
        .iter()
        .flat_map(|s| s.backlog.iter().chain(s.future.iter()))
        .all(|job| job.defects <= 2);
    counters.broken() <= counters.completed()
        && counters.terminated() >= 30
        && terminated == counters.terminated()
        && times_ordered
        && defects_bounded
}
