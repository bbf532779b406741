use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rtcx_stack::{Coroutine, suspend};

fn resume_suspend_roundtrip(c: &mut Criterion) {
    let coro = Coroutine::new(|| {
        loop {
            suspend();
        }
    });

    c.bench_function("resume_suspend_roundtrip", |b| {
        b.iter(|| {
            coro.resume();
            black_box(());
        })
    });

    // The routine loops forever, so the coroutine never completes; dropping
    // it normally would trip the "suspended mid-routine" drop assertion.
    std::mem::forget(coro);
}

criterion_group!(benches, resume_suspend_roundtrip);
criterion_main!(benches);
