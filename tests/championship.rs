use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use liars_dice::{
    championship::Championship,
    channel::ProcessLauncher,
    competitor::Competitor,
    constraints::{Constraints, ConstraintsBuilder},
    history::{History, PastMatch},
    prelude::*,
    report::Report,
    set_runner::{play_set, PenaltyKind, SetResult},
};
use rand::{rngs::StdRng, SeedableRng};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn init_test_logger() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn config() -> Configuration {
    Configuration::new()
        .with_verbose(false)
        .with_contain(false)
        .without_history_file()
}

fn constraints(action_timeout: Duration) -> Constraints {
    ConstraintsBuilder::new()
        .with_ram_per_competitor(200)
        .with_total_cpu_count(1)
        .with_action_timeout(action_timeout)
        .with_shutdown_grace(Duration::from_millis(200))
        .build()
        .unwrap()
}

fn competitor(name: &str, path: impl Into<PathBuf>, id: u32) -> Arc<Competitor> {
    Arc::new(Competitor::new(name, path, id))
}

fn challenger(id: u32) -> Arc<Competitor> {
    competitor("challenger", env!("CARGO_BIN_EXE_challenger"), id)
}

fn climber(id: u32) -> Arc<Competitor> {
    competitor("climber", env!("CARGO_BIN_EXE_climber"), id)
}

fn set(participants: &[Arc<Competitor>], action_timeout: Duration, seed: u64) -> SetResult {
    let mut launcher = ProcessLauncher::new(config(), constraints(action_timeout));
    play_set(
        participants,
        &mut launcher,
        &mut History::new(),
        &mut StdRng::seed_from_u64(seed),
        &Report::silent(),
    )
    .unwrap()
}

fn kinds(result: &SetResult, name: &str) -> Vec<PenaltyKind> {
    result
        .penalties
        .iter()
        .filter(|penalty| penalty.competitor == name)
        .map(|penalty| penalty.kind)
        .collect()
}

#[test]
fn seeded_championship_is_reproducible() {
    init_test_logger();
    let run = || {
        let mut championship = Championship::new(
            vec![challenger(0), climber(1)],
            ProcessLauncher::new(config(), constraints(Duration::from_secs(2))),
            StdRng::seed_from_u64(42),
            Report::silent(),
        );
        championship.play(3).unwrap();
        (
            championship.standings(),
            championship.history().matches().to_vec(),
        )
    };

    let (standings, matches): (Vec<(String, Option<f64>)>, Vec<PastMatch>) = run();
    assert_eq!((standings.clone(), matches.clone()), run());

    // two competitors: ranks 0 and 1 every set
    let total: f64 = standings.iter().filter_map(|(_, score)| *score).sum();
    assert_eq!(total, 1.0);
    // at most 9 matches per set, 3 sets
    assert!(!matches.is_empty() && matches.len() <= 27);
    for past in &matches {
        assert_eq!(past.game.seats.len(), 2);
        assert!(past.game.is_finished());
    }
}

#[test]
fn silent_competitor_fails_once_within_its_deadline() {
    init_test_logger();
    let participants = [
        competitor("mute", env!("CARGO_BIN_EXE_mute"), 0),
        challenger(1),
    ];
    let start = Instant::now();
    let result = set(&participants, Duration::from_millis(200), 1);

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(result.matches_played, 1);
    assert_eq!(
        kinds(&result, "mute")
            .iter()
            .filter(|&&kind| kind == PenaltyKind::CommunicationFailure)
            .count(),
        1
    );
    assert!(kinds(&result, "challenger").is_empty());
    assert_eq!(result.scores[0].1, 0.0);
    assert_eq!(result.scores[1].1, 1.0);
    assert!(result.logs[0].1.contains("ignoring action"));
}

#[test]
fn reference_competitors_play_a_full_set() {
    init_test_logger();
    let participants = [
        challenger(0),
        climber(1),
        competitor("timid", env!("CARGO_BIN_EXE_timid"), 2),
    ];
    let result = set(&participants, Duration::from_secs(2), 5);

    assert!(result.penalties.is_empty(), "{:?}", result.penalties);
    let mut scores = result.scores.iter().map(|(_, s)| *s).collect::<Vec<_>>();
    scores.sort_by(f64::total_cmp);
    assert_eq!(scores.iter().sum::<f64>(), 3.0);
    assert_eq!(scores.last(), Some(&2.0));
}

#[test]
fn unlaunchable_competitor_sits_the_set_out() {
    let participants = [
        competitor("ghost", "/definitely/not/an/executable", 0),
        challenger(1),
        climber(2),
    ];
    let result = set(&participants, Duration::from_secs(2), 2);

    assert_eq!(kinds(&result, "ghost"), vec![PenaltyKind::LaunchFailure]);
    assert_eq!(result.scores[0].1, 0.0);
    assert_eq!(result.logs.len(), 2);
}

#[cfg(unix)]
#[test]
fn competitor_exiting_early_fails_its_briefing() {
    let participants = [challenger(0), competitor("quitter", "true", 1), climber(2)];
    let result = set(&participants, Duration::from_secs(2), 4);

    assert_eq!(kinds(&result, "quitter"), vec![PenaltyKind::BriefingFailure]);
    assert_eq!(result.scores[1].1, 0.0);
    assert_eq!(result.losers.batches()[0][0].name, "quitter");
}

#[cfg(unix)]
#[test]
fn dealer_collects_plays_and_saves() {
    use std::os::unix::fs::PermissionsExt;

    let root = std::env::temp_dir().join(format!("liars-dice-dealer-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    let competitors = root.join("competitors");
    for (name, exe) in [
        ("challenger", env!("CARGO_BIN_EXE_challenger")),
        ("climber", env!("CARGO_BIN_EXE_climber")),
    ] {
        let dir = competitors.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let run = dir.join("run");
        std::fs::write(&run, format!("#!/bin/sh\nexec '{exe}' \"$@\"\n")).unwrap();
        std::fs::set_permissions(&run, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    let history_file = root.join("all-games.json");

    let dealer = Dealer::new(
        config().with_seed(3).with_history_file(&history_file),
        constraints(Duration::from_secs(2)),
    );
    let standings = dealer.evaluate(&competitors, 2).unwrap();
    let saved = std::fs::read_to_string(&history_file).unwrap();
    let _ = std::fs::remove_dir_all(&root);

    assert_eq!(standings.len(), 2);
    assert!(standings[0].1 >= standings[1].1);
    let matches: Vec<PastMatch> = serde_json::from_str(&saved).unwrap();
    assert!(!matches.is_empty());
    assert!(matches
        .iter()
        .all(|past| past.ids.contains_key("challenger") && past.ids.contains_key("climber")));
}
