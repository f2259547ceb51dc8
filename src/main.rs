// Copyright 2026 The Sysmem Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Demonstration binary. Not part of the core: probes processor count,
//! brings the façade up, runs a short allocate/free workload through it,
//! and tears it back down.

use sysmem::facade;
use sysmem::tag::Tag;

const DEFAULT_CAPACITY: u64 = 16 * 1024 * 1024;

fn capacity_from_args() -> u64 {
    match std::env::args().nth(1) {
        Some(arg) => arg.parse().unwrap_or_else(|_| {
            eprintln!("sysmem-demo: ignoring unparseable capacity argument {arg:?}");
            DEFAULT_CAPACITY
        }),
        None => DEFAULT_CAPACITY,
    }
}

fn main() {
    env_logger::init();

    let processors = sysmem::platform::available_parallelism();
    log::info!("sysmem-demo: {processors} processor(s) available");

    let capacity = capacity_from_args();
    if let Err(err) = facade::startup(capacity) {
        log::error!("sysmem-demo: startup failed: {err}");
        std::process::exit(1);
    }

    match facade::allocate(256, Tag::Application) {
        Ok(ptr) => {
            // SAFETY: just-allocated 256-byte block, exclusively owned here.
            unsafe { facade::set(ptr, 0x42, 256) };
            log::info!("sysmem-demo: allocated and filled 256 bytes at {ptr:p}");
            if let Err(err) = facade::free(ptr, 256, Tag::Application) {
                log::error!("sysmem-demo: free failed: {err}");
            }
        }
        Err(err) => log::error!("sysmem-demo: allocate failed: {err}"),
    }

    log::info!("{}", facade::stat());

    if let Err(err) = facade::shutdown() {
        log::error!("sysmem-demo: shutdown failed: {err}");
        std::process::exit(1);
    }
}
