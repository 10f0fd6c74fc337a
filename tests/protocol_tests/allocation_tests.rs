//! Allocation Tests
//!
//! Checks that decoder memory follows the bytes received, not the lengths
//! a peer announces. Kept in its own test binary because it installs a
//! tracking global allocator.

use std::alloc::{GlobalAlloc, Layout, System};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use resptap::protocol::{read_command, read_response};
use resptap::ProxyError;

/// Records the largest single allocation request
struct Tracking;

static LARGEST: AtomicUsize = AtomicUsize::new(0);

unsafe impl GlobalAlloc for Tracking {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        LARGEST.fetch_max(layout.size(), Ordering::Relaxed);
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        LARGEST.fetch_max(new_size, Ordering::Relaxed);
        System.realloc(ptr, layout, new_size)
    }
}

#[global_allocator]
static GLOBAL: Tracking = Tracking;

const ONE_MB: usize = 1024 * 1024;

#[test]
fn test_announced_bulk_length_is_not_preallocated() {
    LARGEST.store(0, Ordering::Relaxed);

    // Nearly 512 MB announced, three bytes sent
    let command = read_command(&mut Cursor::new(b"*1\r\n$536870000\r\nabc".to_vec()));
    let response = read_response(&mut Cursor::new(b"$536870000\r\nabc".to_vec()));

    assert!(matches!(command, Err(ProxyError::EndOfStream)));
    assert!(matches!(response, Err(ProxyError::EndOfStream)));

    let largest = LARGEST.load(Ordering::Relaxed);
    assert!(largest < ONE_MB, "largest allocation was {} bytes", largest);
}
