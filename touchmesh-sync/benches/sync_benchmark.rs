use criterion::{criterion_group, criterion_main, Criterion};
use std::collections::HashMap;
use std::hint::black_box;
use touchmesh_sync::broadcast::BroadcastGroup;
use touchmesh_sync::identity::{Color, Identity};
use touchmesh_sync::local::LocalContacts;
use touchmesh_sync::protocol::WireMessage;
use touchmesh_sync::remote::{ParticipantState, RemoteStore};
use touchmesh_sync::render::build_touch_instances;
use touchmesh_sync::session::Session;
use touchmesh_sync::touch::{ContactId, ContactPoint, TouchSample};

const COLOR: Color = Color::WHITE;

fn ten_points() -> Vec<ContactPoint> {
    (0..10)
        .map(|i| ContactPoint {
            id: ContactId::Touch(i),
            x: i as f64 * 10.0,
            y: i as f64 * 20.0,
            color: COLOR,
        })
        .collect()
}

fn bench_update_encode(c: &mut Criterion) {
    let points = ten_points();

    c.bench_function("update_encode_10_touches", |b| {
        b.iter(|| {
            let msg = WireMessage::update(black_box("abcd1234"), COLOR, black_box(&points));
            black_box(msg.encode().unwrap());
        })
    });
}

fn bench_update_decode(c: &mut Criterion) {
    let text = WireMessage::update("abcd1234", COLOR, &ten_points())
        .encode()
        .unwrap();

    c.bench_function("update_decode_10_touches", |b| {
        b.iter(|| {
            black_box(WireMessage::decode(black_box(&text)).unwrap());
        })
    });
}

fn bench_local_upsert(c: &mut Criterion) {
    c.bench_function("local_upsert_1000_moves", |b| {
        b.iter(|| {
            let mut local = LocalContacts::new(COLOR);
            for i in 0..1000 {
                local.upsert(ContactId::Touch(i % 5), i as f64, i as f64);
            }
            black_box(local.snapshot());
        })
    });
}

fn bench_remote_apply_update(c: &mut Criterion) {
    let samples: Vec<TouchSample> = ten_points().iter().map(ContactPoint::to_sample).collect();

    c.bench_function("remote_apply_update_100_peers", |b| {
        b.iter(|| {
            let mut store = RemoteStore::new();
            for peer in 0..100 {
                store.apply_update(&format!("peer{peer:04}"), samples.clone(), COLOR);
            }
            black_box(store.count());
        })
    });
}

fn bench_session_move(c: &mut Criterion) {
    let mut session: Session<Vec<String>> = Session::new(
        Identity::new("abcd1234", COLOR),
        std::time::Duration::from_secs(3),
    );

    c.bench_function("session_touch_move_open", |b| {
        b.iter(|| {
            // Fresh sink each pass so the frame buffer does not grow unbounded.
            session.on_transport_open(Vec::new());
            for i in 0..100 {
                session.upsert(ContactId::Touch(1), i as f64, i as f64);
            }
            session.drain_events().for_each(drop);
        })
    });
}

fn bench_frame_handle(c: &mut Criterion) {
    let mut session: Session<Vec<String>> = Session::new(
        Identity::new("local001", COLOR),
        std::time::Duration::from_secs(3),
    );
    let frame = WireMessage::update("abcd1234", COLOR, &ten_points())
        .encode()
        .unwrap();

    c.bench_function("session_handle_update_frame", |b| {
        b.iter(|| {
            session.handle_frame(black_box(&frame)).unwrap();
            session.drain_events().for_each(drop);
        })
    });
}

fn bench_build_instances(c: &mut Criterion) {
    let mut remote = HashMap::new();
    for peer in 0..100 {
        remote.insert(
            format!("peer{peer:04}"),
            ParticipantState {
                touches: ten_points(),
                color: COLOR,
            },
        );
    }
    let local = ten_points();

    c.bench_function("build_1010_touch_instances", |b| {
        b.iter(|| {
            black_box(build_touch_instances(black_box(&local), black_box(&remote)));
        })
    });
}

fn bench_broadcast_1000_frames(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let group = BroadcastGroup::new(2048);
    let addr = "127.0.0.1:1".parse().unwrap();
    let _receivers: Vec<_> = rt.block_on(async {
        let mut receivers = Vec::new();
        for _ in 0..100 {
            receivers.push(group.add_peer(addr).await);
        }
        receivers
    });
    let frame = WireMessage::update("abcd1234", COLOR, &ten_points())
        .encode()
        .unwrap();

    c.bench_function("broadcast_1000_frames_100_peers", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                group.broadcast(0, frame.clone());
            }
        })
    });
}

criterion_group!(
    benches,
    bench_update_encode,
    bench_update_decode,
    bench_local_upsert,
    bench_remote_apply_update,
    bench_session_move,
    bench_frame_handle,
    bench_build_instances,
    bench_broadcast_1000_frames,
);
criterion_main!(benches);
