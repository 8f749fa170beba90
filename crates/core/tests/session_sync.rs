//! End to end synchronization against a scripted console.
//!
//! The console side is driven through a [`ChannelPeer`]; the clock is paused
//! so heartbeats and timeouts advance only while every task is idle.

use std::collections::VecDeque;
use std::time::Duration;

use eoslink_core::{
    ChannelPeer, ChannelTransport, ConnectionState, ConsoleSession, SessionEvent, SessionSettings,
};
use eoslink_records::{Argument, Console, ConsoleType, EosMessage, Record, RecordTarget};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{timeout_at, Instant};
use uuid::Uuid;

const PATIENCE: Duration = Duration::from_secs(60);

/// Plays the console. Heartbeats are echoed as they arrive; every other
/// request is queued until a test asks for it.
struct FakeConsole {
    peer: ChannelPeer,
    received: VecDeque<EosMessage>,
}

impl FakeConsole {
    fn new(peer: ChannelPeer) -> Self {
        Self {
            peer,
            received: VecDeque::new(),
        }
    }

    async fn expect(&mut self, address: &str) -> EosMessage {
        let deadline = Instant::now() + PATIENCE;
        loop {
            if let Some(at) = self.received.iter().position(|m| m.address == address) {
                return self.received.remove(at).unwrap();
            }
            let packet = timeout_at(deadline, self.peer.recv())
                .await
                .unwrap_or_else(|_| panic!("no request for {}, saw {:?}", address, self.seen()))
                .expect("session dropped its transport");
            for message in packet.messages() {
                if message.address == "/eos/ping" {
                    self.send("/ping", message.arguments.clone()).await;
                } else {
                    self.received.push_back(message.clone());
                }
            }
        }
    }

    async fn send(&self, address: &str, arguments: Vec<Argument>) {
        let message = EosMessage::new(format!("/eos/out{}", address), arguments);
        assert!(self.peer.reply(message).await, "session is not listening");
    }

    async fn send_all(&self, messages: Vec<EosMessage>) {
        for message in messages {
            self.send(&message.address, message.arguments).await;
        }
    }

    fn seen(&self) -> Vec<&str> {
        self.received.iter().map(|m| m.address.as_str()).collect()
    }
}

fn record(address: &str, id: Uuid, rest: Vec<Argument>) -> EosMessage {
    let mut arguments = vec![Argument::Int(0), Argument::String(id.to_string())];
    arguments.extend(rest);
    EosMessage::new(address, arguments)
}

fn group(number: u32, id: Uuid, label: &str) -> Vec<EosMessage> {
    vec![
        record(
            &format!("/get/group/{}/list/0/1", number),
            id,
            vec![Argument::from(label)],
        ),
        record(
            &format!("/get/group/{}/channels/list/0/1", number),
            id,
            vec![Argument::from("1-4"), Argument::Int(9)],
        ),
    ]
}

fn cue_list(number: u32, id: Uuid) -> Vec<EosMessage> {
    let mut head = vec![
        Argument::from("Main"),
        Argument::from("Normal"),
        Argument::from("Proportional"),
    ];
    head.extend((0..6).map(|_| Argument::Bool(false)));
    head.push(Argument::Int(0));
    head.push(Argument::Bool(false));
    vec![
        record(&format!("/get/cuelist/{}/list/0/1", number), id, head),
        record(&format!("/get/cuelist/{}/links/list/0/1", number), id, vec![]),
    ]
}

fn cue(list: u32, number: &str, id: Uuid) -> Vec<EosMessage> {
    let base = format!("/get/cue/{}/{}/noparts", list, number);
    let mut head: Vec<Argument> = vec![Argument::from("Cue")];
    head.extend((0..10).map(|_| Argument::Int(0)));
    head.extend([
        Argument::Bool(false),
        Argument::Int(0),
        Argument::Int(100),
        Argument::from(""),
        Argument::from(""),
        Argument::from(""),
        Argument::Int(0),
        Argument::Int(-1),
        Argument::Int(-1),
        Argument::Bool(false),
        Argument::Int(0),
        Argument::Bool(false),
        Argument::from(""),
        Argument::Int(0),
        Argument::from(""),
        Argument::from(""),
        Argument::Bool(false),
    ]);
    let mut messages = vec![record(&format!("{}/list/0/1", base), id, head)];
    for satellite in ["fx", "links", "actions"] {
        messages.push(record(&format!("{}/{}/list/0/1", base, satellite), id, vec![]));
    }
    messages
}

async fn wait_for(
    events: &mut UnboundedReceiver<SessionEvent>,
    wanted: impl Fn(&SessionEvent) -> bool,
) -> Vec<SessionEvent> {
    let deadline = Instant::now() + PATIENCE;
    let mut seen = Vec::new();
    loop {
        let event = timeout_at(deadline, events.recv())
            .await
            .unwrap_or_else(|_| panic!("event never arrived, saw {:?}", seen))
            .expect("session stopped");
        let done = wanted(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// Yields to the worker until `condition` holds.
async fn settle(session: &ConsoleSession, condition: impl Fn(&ConsoleSession) -> bool) {
    for _ in 0..100 {
        if condition(session) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session never settled");
}

fn labels(session: &ConsoleSession) -> Vec<(f64, String)> {
    session
        .snapshot(RecordTarget::Group)
        .map(|snapshot| {
            snapshot
                .records()
                .iter()
                .map(|record| match record {
                    Record::Group(group) => (group.number, group.label.clone()),
                    other => panic!("unexpected record {:?}", other),
                })
                .collect()
        })
        .unwrap_or_default()
}

async fn start(
    targets: &[RecordTarget],
) -> (ConsoleSession, UnboundedReceiver<SessionEvent>, FakeConsole) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (transport, peer) = ChannelTransport::pair();
    let console = Console::new("Test", ConsoleType::Eos, "127.0.0.1", 8000);
    let (session, events) = ConsoleSession::start(
        console,
        "test",
        Box::new(transport),
        SessionSettings::default(),
    );
    session.subscribe(targets.iter().copied()).await.unwrap();
    session.connect().await.unwrap();

    let mut fake = FakeConsole::new(peer);
    fake.expect("/eos/get/version").await;
    fake.send("/get/version", vec![Argument::from("3.2.6")]).await;
    (session, events, fake)
}

/// Two groups, delivered out of order and interleaved.
async fn synchronized_groups() -> (
    ConsoleSession,
    UnboundedReceiver<SessionEvent>,
    FakeConsole,
    Uuid,
    Uuid,
) {
    let (session, mut events, mut fake) = start(&[RecordTarget::Group]).await;
    fake.expect("/eos/get/group/count").await;
    fake.send("/get/group/count", vec![Argument::Int(2)]).await;
    fake.expect("/eos/get/group/index/0").await;
    fake.expect("/eos/get/group/index/1").await;

    let front = Uuid::new_v4();
    let back = Uuid::new_v4();
    let mut second = group(2, back, "Back");
    let mut first = group(1, front, "Front");
    fake.send_all(vec![second.remove(1), first.remove(0), second.remove(0), first.remove(0)])
        .await;

    wait_for(&mut events, |event| {
        matches!(event, SessionEvent::Synchronized { target: RecordTarget::Group })
    })
    .await;
    (session, events, fake, front, back)
}

#[tokio::test(start_paused = true)]
async fn test_group_fetch_synchronizes() {
    let (session, mut events, mut fake) = start(&[RecordTarget::Group]).await;
    let system = fake.expect("/eos/filter/add").await;
    assert!(system.arguments.contains(&Argument::from("/eos/out/ping")));
    let added = fake.expect("/eos/filter/add").await;
    assert!(added.arguments.contains(&Argument::from("/eos/out/get/group/*/list/*/*")));

    fake.expect("/eos/get/group/count").await;
    fake.send("/get/group/count", vec![Argument::Int(2)]).await;
    fake.expect("/eos/get/group/index/0").await;
    fake.expect("/eos/get/group/index/1").await;
    fake.send_all(group(2, Uuid::new_v4(), "Back")).await;
    fake.send_all(group(1, Uuid::new_v4(), "Front")).await;

    let seen = wait_for(&mut events, |event| {
        matches!(event, SessionEvent::Synchronized { target: RecordTarget::Group })
    })
    .await;
    let fractions: Vec<f64> = seen
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Progress { target: RecordTarget::Group, fraction, .. } => Some(*fraction),
            _ => None,
        })
        .collect();
    assert!(fractions.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(fractions.last(), Some(&1.0));
    assert!(seen.contains(&SessionEvent::Version {
        version: "3.2.6".to_string()
    }));

    assert!(session.is_synchronized(RecordTarget::Group));
    assert_eq!(session.version().as_deref(), Some("3.2.6"));
    assert_eq!(
        labels(&session),
        vec![(1.0, "Front".to_string()), (2.0, "Back".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_notify_with_empty_reply_removes_record() {
    let (session, _events, mut fake, _front, back) = synchronized_groups().await;

    fake.send("/notify/group/list/0/1", vec![Argument::Int(14), Argument::Int(2)])
        .await;
    fake.expect(&format!("/eos/get/group/uid/{}", back)).await;
    fake.send("/get/group/2", vec![]).await;

    settle(&session, |session| labels(session).len() == 1).await;
    assert_eq!(labels(&session), vec![(1.0, "Front".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_incomplete_record_leaves_collection_unchanged() {
    let (session, _events, mut fake, _front, _back) = synchronized_groups().await;

    fake.send("/notify/group/list/0/1", vec![Argument::Int(15), Argument::Int(3)])
        .await;
    fake.expect("/eos/get/group/3").await;
    let mut messages = group(3, Uuid::new_v4(), "Side");
    fake.send_all(vec![messages.remove(0)]).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(labels(&session).len(), 2);

    fake.send_all(messages).await;
    settle(&session, |session| labels(session).len() == 3).await;
    assert_eq!(labels(&session)[2], (3.0, "Side".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_renumbered_record_keeps_identity() {
    let (session, _events, mut fake, front, _back) = synchronized_groups().await;

    fake.send("/notify/group/list/0/1", vec![Argument::Int(16), Argument::Int(1)])
        .await;
    fake.expect(&format!("/eos/get/group/uid/{}", front)).await;
    fake.send_all(group(5, front, "Front")).await;

    settle(&session, |session| {
        labels(session).first().map(|(number, _)| *number) == Some(2.0)
    })
    .await;
    assert_eq!(
        labels(&session),
        vec![(2.0, "Back".to_string()), (5.0, "Front".to_string())]
    );
    let snapshot = session.snapshot(RecordTarget::Group).unwrap();
    assert_eq!(snapshot.records()[1].uuid(), front);
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_drops_snapshot() {
    let (session, _events, mut fake, _front, _back) = synchronized_groups().await;

    session.unsubscribe([RecordTarget::Group]).await.unwrap();
    let removed = fake.expect("/eos/filter/remove").await;
    assert!(removed
        .arguments
        .contains(&Argument::from("/eos/out/notify/group/list/*/*")));
    settle(&session, |session| session.snapshot(RecordTarget::Group).is_none()).await;
    assert!(!session.is_synchronized(RecordTarget::Group));
}

#[tokio::test(start_paused = true)]
async fn test_cues_are_ordered_by_number() {
    let (session, mut events, mut fake) = start(&[RecordTarget::Cue]).await;

    fake.expect("/eos/get/cuelist/count").await;
    fake.send("/get/cuelist/count", vec![Argument::Int(1)]).await;
    fake.expect("/eos/get/cuelist/index/0").await;
    fake.send_all(cue_list(1, Uuid::new_v4())).await;

    fake.expect("/eos/get/cue/1/noparts/count").await;
    fake.send("/get/cue/1/noparts/count", vec![Argument::Int(3)]).await;
    for number in ["10", "2", "2.5"] {
        fake.send_all(cue(1, number, Uuid::new_v4())).await;
    }

    wait_for(&mut events, |event| {
        matches!(event, SessionEvent::Synchronized { target: RecordTarget::Cue })
    })
    .await;
    let snapshot = session.snapshot(RecordTarget::Cue).unwrap();
    let lists = snapshot.cue_lists();
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].list.number, 1);
    let numbers: Vec<f64> = lists[0].cues.iter().map(|cue| cue.number).collect();
    assert_eq!(numbers, vec![2.0, 2.5, 10.0]);
}

#[tokio::test(start_paused = true)]
async fn test_query_round_trip() {
    let (session, _events, mut fake) = start(&[]).await;

    let (reply, _) = tokio::join!(session.query("/get/cue/1/count"), async {
        fake.expect("/eos/get/cue/1/count").await;
        fake.send("/get/cue/1/count", vec![Argument::Int(42)]).await;
    });
    assert_eq!(reply.unwrap().int(0), Some(42));
}

#[tokio::test(start_paused = true)]
async fn test_silent_console_becomes_unresponsive() {
    let (session, mut events, fake) = start(&[]).await;
    wait_for(&mut events, |event| {
        *event
            == SessionEvent::StateChanged {
                state: ConnectionState::Responsive,
            }
    })
    .await;

    // Stop answering heartbeats.
    wait_for(&mut events, |event| {
        *event
            == SessionEvent::StateChanged {
                state: ConnectionState::Unresponsive,
            }
    })
    .await;

    fake.peer.disconnect_remote().await;
    wait_for(&mut events, |event| {
        *event
            == SessionEvent::StateChanged {
                state: ConnectionState::Disconnected,
            }
    })
    .await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_completes() {
    let (mut session, mut events, _fake) = start(&[RecordTarget::Macro]).await;
    session.shutdown().await.unwrap();
    wait_for(&mut events, |event| *event == SessionEvent::ShutdownComplete).await;
    assert!(session.connect().await.is_err());
}
