// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runs a staged stand-in for protoc as a real child process.
//!
//! Kept in its own test binary: executing a file that was just written is
//! racy when other test threads are forking at the same time.

#![cfg(unix)]

mod common;

use std::fs;

use common::TestBundle;
use grpc_generator::{Generator, Platform, Stager, SystemExecutor};
use tempfile::TempDir;

const FAKE_PROTOC: &str = r#"#!/bin/sh
printf '%s\n' "$@" > protoc-args.txt
exit 4
"#;

#[test]
fn test_protoc_runs_in_working_dir_and_exit_code_is_forwarded() {
    let bundle = TestBundle::new();
    bundle.write_resource("exe/protoc-linux-x86_64", FAKE_PROTOC.as_bytes());
    let work = TempDir::new().unwrap();
    let working_dir = format!("working_dir={}", work.path().display());

    let routed = bundle.route(&[
        working_dir.as_str(),
        "nogrpc",
        "noosgi",
        "--java_out=out",
        "health.proto",
    ]);
    let stager =
        Stager::new(bundle.cache(), bundle.resources()).with_platform(Some(Platform::Linux));

    let code = Generator::new(stager, SystemExecutor).run(&routed).unwrap();

    assert_eq!(code, 4);
    let recorded = fs::read_to_string(work.path().join("protoc-args.txt")).unwrap();
    assert_eq!(
        recorded.lines().collect::<Vec<_>>(),
        vec!["--java_out=out", "health.proto"]
    );
}
