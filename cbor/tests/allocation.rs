// Runs as its own binary so the counting allocator sees only this test.

use cbor_visitor::{Decoder, Error, Value, decode, typed::decode_array};
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

struct Counting;

static CURRENT: AtomicUsize = AtomicUsize::new(0);
static PEAK: AtomicUsize = AtomicUsize::new(0);

unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            let now = CURRENT.fetch_add(layout.size(), Ordering::Relaxed) + layout.size();
            PEAK.fetch_max(now, Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        CURRENT.fetch_sub(layout.size(), Ordering::Relaxed);
    }
}

#[global_allocator]
static ALLOCATOR: Counting = Counting;

const INPUT_LEN: usize = 100_000;
const LEVELS: usize = 100;
const BUDGET: usize = 2_000_000;

/// Nested 4-byte-length headers, each claiming as much as the rest of the
/// input can hold, around a reserved initial byte.
fn nested_headers(initial: u8, per_byte: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(INPUT_LEN);
    for level in 0..LEVELS {
        let remaining = INPUT_LEN - 5 * (level + 1);
        data.push(initial);
        data.extend_from_slice(&((remaining / per_byte) as u32).to_be_bytes());
    }
    data.resize(INPUT_LEN, 0x1c);
    data
}

/// Heap growth above the starting point while `f` runs.
fn peak_growth<R>(f: impl FnOnce() -> R) -> (R, usize) {
    let start = CURRENT.load(Ordering::Relaxed);
    PEAK.store(start, Ordering::Relaxed);
    let r = f();
    (r, PEAK.load(Ordering::Relaxed).saturating_sub(start))
}

#[test]
fn declared_lengths_do_not_drive_allocation() {
    let arrays = nested_headers(0x9a, 1);
    let (r, grown) = peak_growth(|| decode(&arrays));
    assert_eq!(r, Err(Error::ReservedOrUnassignedCode(0x1c)));
    assert!(grown < BUDGET, "nested arrays grew the heap by {grown} bytes");

    let (r, grown) = peak_growth(|| decode_array::<Value>(&mut Decoder::new(&arrays)));
    assert_eq!(r, Err(Error::ReservedOrUnassignedCode(0x1c)));
    assert!(grown < BUDGET, "typed arrays grew the heap by {grown} bytes");

    let maps = nested_headers(0xba, 2);
    let (r, grown) = peak_growth(|| decode(&maps));
    assert_eq!(r, Err(Error::ReservedOrUnassignedCode(0x1c)));
    assert!(grown < BUDGET, "nested maps grew the heap by {grown} bytes");
}
