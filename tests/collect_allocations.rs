//! Heap allocations made by `EntityRecorder::collect`.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

use meter_rs::{CollectionContext, InstrumentDescriptor, MeterBuilder, Providers};

struct CountingAlloc;

thread_local! {
    static ALLOCS: Cell<usize> = const { Cell::new(0) };
}

fn bump() {
    let _ = ALLOCS.try_with(|c| c.set(c.get() + 1));
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        bump();
        System.alloc(layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        bump();
        System.alloc_zeroed(layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        bump();
        System.realloc(ptr, layout, new_size)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

fn allocations_during<R>(f: impl FnOnce() -> R) -> (usize, R) {
    let before = ALLOCS.with(Cell::get);
    let out = f();
    (ALLOCS.with(Cell::get) - before, out)
}

const POOL: &[InstrumentDescriptor] = &[
    InstrumentDescriptor::min_max_counter("queued"),
    InstrumentDescriptor::gauge("pool-size"),
];

#[test]
fn test_recycled_collect_does_not_allocate() {
    let meter = MeterBuilder::new().include("pool", "*").build().unwrap();
    let recorder = meter
        .on_entity_created("pool", "workers", POOL, &Providers::new().with("pool-size", || 4i64))
        .unwrap()
        .unwrap();
    recorder.min_max_counter("queued").unwrap().increment(3);
    recorder.refresh();

    let mut ctx = CollectionContext::with_capacity(1);
    let warm = recorder.collect(&mut ctx);
    ctx.recycle(warm);

    let (recycled, snapshot) = allocations_during(|| recorder.collect(&mut ctx));
    assert_eq!(recycled, 0);
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.get("queued").map(|s| s.max()), Some(3));
    assert_eq!(snapshot.get("pool-size").map(|s| s.max()), Some(4));

    // Kept by the caller: the next collect needs one new buffer, exactly sized
    let (fresh, kept) = allocations_during(|| recorder.collect(&mut ctx));
    assert_eq!(fresh, 1);
    assert_eq!(kept.len(), 2);

    let (recycling, ()) = allocations_during(|| ctx.recycle_all([snapshot, kept]));
    assert_eq!(recycling, 0);
    // Room for one only; the other buffer was dropped
    assert_eq!(ctx.spare_buffers(), 1);
}
