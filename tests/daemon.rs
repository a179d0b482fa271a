//! End-to-end supervision of real child processes.

#![cfg(unix)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use chayd::rpc::{self, Gateway, Response};
use chayd::{
    BackoffPolicy, Bus, Command, JitterPolicy, OsSpawner, Program, ProgramState, RestartPolicy,
    StatusHub, StopSignal, SupervisorRegistry,
};

fn sh(name: &str, script: &str) -> Program {
    Program {
        name: name.into(),
        command: "/bin/sh".into(),
        args: vec!["-c".into(), script.into()],
        cwd: None,
        env: BTreeMap::new(),
        autostart: false,
        restart: RestartPolicy::OnFailure,
        backoff: BackoffPolicy {
            base: Duration::from_millis(100),
            max: Duration::from_secs(1),
            max_attempts: 2,
            jitter: JitterPolicy::None,
        },
        settle: Duration::from_secs(5),
        stop_signal: StopSignal::Term,
        stop_timeout: Duration::from_secs(2),
    }
}

fn harness(programs: Vec<Program>) -> (Arc<SupervisorRegistry>, Arc<StatusHub>) {
    let bus = Bus::new(256);
    let hub = Arc::new(StatusHub::new(&programs, 64));
    let registry = Arc::new(SupervisorRegistry::new(
        programs,
        Arc::new(OsSpawner),
        bus,
        Arc::clone(&hub),
        CancellationToken::new(),
    ));
    (registry, hub)
}

async fn wait_for_state(
    registry: &SupervisorRegistry,
    name: &str,
    state: ProgramState,
    deadline: Duration,
) {
    let start = Instant::now();
    loop {
        let snapshot = registry.snapshot();
        if snapshot
            .iter()
            .any(|s| s.name == name && s.state == state)
        {
            return;
        }
        if start.elapsed() > deadline {
            panic!("'{name}' never reached {state}; snapshot: {snapshot:?}");
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn start_and_stop_a_real_child() {
    let (registry, _hub) = harness(vec![sh("sleeper", "sleep 30")]);

    let results = registry.dispatch("sleeper", Command::Start).await.unwrap();
    assert!(results["sleeper"].ok);
    assert_eq!(results["sleeper"].state, ProgramState::Running);
    let snapshot = registry.snapshot();
    assert!(snapshot[0].pid.is_some());
    assert!(snapshot[0].start_time.is_some());

    let results = registry.dispatch("sleeper", Command::Stop).await.unwrap();
    assert!(results["sleeper"].ok);
    assert_eq!(results["sleeper"].state, ProgramState::Stopped);
}

#[tokio::test]
async fn crashing_child_runs_out_of_attempts() {
    let (registry, _hub) = harness(vec![sh("flappy", "exit 7")]);

    registry.dispatch("flappy", Command::Start).await.unwrap();
    // 2 retries at 100ms and 200ms, then the supervisor gives up.
    wait_for_state(&registry, "flappy", ProgramState::Exited, Duration::from_secs(10)).await;

    // A manual start gets a fresh budget and fails the same way again.
    registry.dispatch("flappy", Command::Start).await.unwrap();
    wait_for_state(&registry, "flappy", ProgramState::Exited, Duration::from_secs(10)).await;
}

#[tokio::test]
async fn stubborn_child_is_force_killed() {
    let mut program = sh("stubborn", "trap '' TERM; while :; do sleep 1; done");
    program.stop_timeout = Duration::from_millis(500);
    let (registry, _hub) = harness(vec![program]);

    registry.dispatch("stubborn", Command::Start).await.unwrap();
    wait_for_state(&registry, "stubborn", ProgramState::Running, Duration::from_secs(5)).await;

    let results = registry.dispatch("stubborn", Command::Stop).await.unwrap();
    let result = &results["stubborn"];
    assert!(result.ok);
    assert_eq!(result.state, ProgramState::Stopped);
    assert!(result.detail.as_deref().unwrap().contains("force-killed"));
}

#[tokio::test]
async fn restart_gives_the_child_a_new_pid() {
    let (registry, _hub) = harness(vec![sh("sleeper", "sleep 30")]);

    registry.dispatch("sleeper", Command::Start).await.unwrap();
    let before = registry.snapshot()[0].pid.unwrap();

    let results = registry.dispatch("sleeper", Command::Restart).await.unwrap();
    assert!(results["sleeper"].ok);
    let after = registry.snapshot()[0].pid.unwrap();
    assert_ne!(before, after);

    registry.dispatch("sleeper", Command::Stop).await.unwrap();
}

#[tokio::test]
async fn autostart_and_graceful_shutdown() {
    let mut web = sh("web", "sleep 30");
    web.autostart = true;
    let worker = sh("worker", "sleep 30");
    let (registry, _hub) = harness(vec![web, worker]);

    registry.autostart().await;
    wait_for_state(&registry, "web", ProgramState::Running, Duration::from_secs(5)).await;
    let snapshot = registry.snapshot();
    let worker_status = snapshot.iter().find(|s| s.name == "worker").unwrap();
    assert_eq!(worker_status.state, ProgramState::Stopped);

    registry.shutdown(Duration::from_secs(5)).await.unwrap();
    assert!(registry
        .snapshot()
        .iter()
        .all(|s| s.state == ProgramState::Stopped));
}

#[tokio::test]
async fn glob_dispatch_touches_only_matches() {
    let (registry, _hub) = harness(vec![
        sh("web-1", "sleep 30"),
        sh("web-2", "sleep 30"),
        sh("worker", "sleep 30"),
    ]);

    let results = registry.dispatch("web-*", Command::Start).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.values().all(|r| r.ok));

    let snapshot = registry.snapshot();
    let worker_status = snapshot.iter().find(|s| s.name == "worker").unwrap();
    assert_eq!(worker_status.state, ProgramState::Stopped);

    registry.dispatch("all", Command::Stop).await.unwrap();
}

async fn ask(
    writer: &mut tokio::net::unix::WriteHalf<'_>,
    lines: &mut tokio::io::Lines<BufReader<tokio::net::unix::ReadHalf<'_>>>,
    request: &str,
) -> Response {
    writer.write_all(request.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    let line = lines.next_line().await.unwrap().unwrap();
    serde_json::from_str(&line).unwrap()
}

#[tokio::test]
async fn rpc_round_trip_with_a_real_child() {
    let programs = vec![sh("sleeper", "sleep 30")];
    let (registry, hub) = harness(programs);
    let gateway = Arc::new(Gateway::new(Arc::clone(&registry), hub));

    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("chayd.sock");
    let token = CancellationToken::new();
    tokio::spawn(rpc::serve(socket.clone(), gateway, token.clone()));
    for _ in 0..100 {
        if socket.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut stream = UnixStream::connect(&socket).await.unwrap();
    let (reader, mut writer) = stream.split();
    let mut lines = BufReader::new(reader).lines();

    match ask(&mut writer, &mut lines, r#"{"op":"health"}"#).await {
        Response::Health { ok, programs } => {
            assert!(ok);
            assert_eq!(programs, 1);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    match ask(&mut writer, &mut lines, r#"{"op":"start","expr":"sleeper"}"#).await {
        Response::Results { results } => {
            assert!(results["sleeper"].ok);
            assert_eq!(results["sleeper"].state, ProgramState::Running);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    match ask(&mut writer, &mut lines, r#"{"op":"status"}"#).await {
        Response::Snapshot { programs } => {
            assert_eq!(programs[0].state, ProgramState::Running);
            assert!(programs[0].uptime >= Duration::ZERO);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    match ask(&mut writer, &mut lines, r#"{"op":"stop","expr":"all"}"#).await {
        Response::Results { results } => {
            assert_eq!(results["sleeper"].state, ProgramState::Stopped);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    token.cancel();
}
