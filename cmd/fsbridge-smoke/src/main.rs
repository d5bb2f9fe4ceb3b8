//! fsbridge End-to-End Smoke Test
//!
//! Exercises the full stack against a scratch directory:
//!   Part A — Layout contract: record size/offset, platform constants
//!   Part B — Lifecycle: open → write → read → stat → truncate → rename
//!            → chmod → unlink, one record reused throughout
//!   Part C — Concurrency: many records in flight, exactly-once delivery
//!
//! Run: ./target/release/fsbridge-smoke

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fsbridge::{consts, BridgeError, FsBridge, FsRequest, RequestId, StatRecord};

// ── Test harness ──

struct TestRunner {
    total: usize,
    passed: usize,
    failed: usize,
}

const LINE: &str = "────────────────────────────────────────────────────────────";

impl TestRunner {
    fn new() -> Self {
        Self {
            total: 0,
            passed: 0,
            failed: 0,
        }
    }

    fn section(&self, name: &str) {
        println!("\n{}", LINE);
        println!("  {}", name);
        println!("{}", LINE);
    }

    fn pass(&mut self, name: &str) {
        self.total += 1;
        self.passed += 1;
        println!("  [{:2}] {:<52} PASS", self.total, name);
    }

    fn fail(&mut self, name: &str, reason: &str) {
        self.total += 1;
        self.failed += 1;
        println!("  [{:2}] {:<52} FAIL: {}", self.total, name, reason);
    }

    fn check(&mut self, name: &str, ok: bool, reason: &str) {
        if ok {
            self.pass(name);
        } else {
            self.fail(name, reason);
        }
    }

    fn summary(&self) {
        println!("\n{}", LINE);
        println!(
            "  Total: {}  Passed: {}  Failed: {}",
            self.total, self.passed, self.failed
        );
        println!("{}", LINE);
    }
}

/// Bridge plus the callback's event log.
struct Harness {
    bridge: FsBridge,
    events: Arc<Mutex<Vec<(u32, i32)>>>,
    seen: usize,
}

impl Harness {
    fn new() -> Result<Self, BridgeError> {
        let events: Arc<Mutex<Vec<(u32, i32)>>> = Arc::new(Mutex::new(Vec::new()));
        let log = events.clone();
        let builder = FsBridge::builder().worker_count(2).queue_depth(64);
        let bridge = builder.build(move |id, result| {
            log.lock().unwrap().push((id.as_u32(), result));
        })?;
        Ok(Self {
            bridge,
            events,
            seen: 0,
        })
    }

    /// Drain until `n` further completions arrive (or time out).
    fn wait(&mut self, n: usize) -> Option<Vec<(u32, i32)>> {
        let target = self.seen + n;
        for _ in 0..2000 {
            self.bridge.drain(64);
            let log = self.events.lock().unwrap();
            if log.len() >= target {
                let out = log[self.seen..target].to_vec();
                drop(log);
                self.seen = target;
                return Some(out);
            }
            drop(log);
            std::thread::sleep(Duration::from_millis(1));
        }
        None
    }

    /// Run one op to completion; returns the result code.
    fn one<F>(&mut self, f: F) -> i32
    where
        F: FnOnce(&FsBridge, &Arc<FsRequest>) -> Result<(), BridgeError>,
    {
        let req = Arc::new(FsRequest::new(RequestId::new(0)));
        if let Err(e) = f(&self.bridge, &req) {
            println!("       dispatch error: {}", e);
            return i32::MIN;
        }
        match self.wait(1) {
            Some(events) => events[0].1,
            None => {
                println!("       completion timed out");
                i32::MIN
            }
        }
    }
}

// ════════════════════════════════════════════════════════════
// Part A: Layout contract
// ════════════════════════════════════════════════════════════

fn test_layout(t: &mut TestRunner) {
    t.section("Part A: Layout contract & constants");

    t.check(
        "record size covers the id field",
        FsRequest::ID_OFFSET + 4 <= FsRequest::SIZE,
        "id offset outside record",
    );

    let req = FsRequest::new(RequestId::new(0x1234_5678));
    let base = &req as *const FsRequest as *const u8;
    let raw = unsafe { *(base.add(FsRequest::ID_OFFSET) as *const u32) };
    t.check(
        "id readable at ID_OFFSET",
        raw == 0x1234_5678,
        "offset read mismatch",
    );

    t.check(
        "file-type bits fit the mode mask",
        consts::S_IFREG & consts::S_IFMT == consts::S_IFREG
            && consts::S_IFDIR & consts::S_IFMT == consts::S_IFDIR,
        "mask mismatch",
    );
    t.check("ENOENT is nonzero", consts::ENOENT != 0, "bad errno constant");
    println!("    IS_WINDOWS: {}", consts::IS_WINDOWS);
}

// ════════════════════════════════════════════════════════════
// Part B: Lifecycle
// ════════════════════════════════════════════════════════════

fn test_lifecycle(t: &mut TestRunner, h: &mut Harness, dir: &str) {
    t.section("Part B: Operation lifecycle");

    let file = format!("{}/data.bin", dir);
    let moved = format!("{}/moved.bin", dir);

    let fd = h.one(|b, r| b.open(r, &file, consts::O_RDWR | consts::O_CREAT, 0o644));
    t.check("open creates a file", fd >= 0, &format!("result {}", fd));
    let fd = fd as u32;

    let payload = b"hello";
    let wrote = h.one(|b, r| unsafe { b.write(r, fd, payload, 0, 5, 0, 0) });
    t.check("write 5 bytes at 0", wrote == 5, &format!("result {}", wrote));

    let mut back = [0u8; 5];
    let read = h.one(|b, r| unsafe { b.read(r, fd, &mut back, 0, 5, 0, 0) });
    t.check(
        "read returns the bytes",
        read == 5 && &back == payload,
        &format!("result {} data {:?}", read, back),
    );

    let mut stat = [0u64; 16];
    let r = {
        let req = Arc::new(FsRequest::new(RequestId::new(0)));
        unsafe { h.bridge.fstat(&req, fd, &mut stat).unwrap() };
        h.wait(1).map(|e| e[0].1).unwrap_or(i32::MIN)
    };
    t.check(
        "fstat sees size 5, regular file",
        r == 0 && stat[7] == 5 && stat[1] as u32 & consts::S_IFMT == consts::S_IFREG,
        &format!("result {} size {} mode {:o}", r, stat[7], stat[1]),
    );

    let r = h.one(|b, req| b.ftruncate(req, fd, 5, 0));
    t.check("truncate to current length", r == 0, &format!("result {}", r));
    let r = {
        let req = Arc::new(FsRequest::new(RequestId::new(0)));
        unsafe { h.bridge.fstat(&req, fd, &mut stat).unwrap() };
        h.wait(1).map(|e| e[0].1).unwrap_or(i32::MIN)
    };
    t.check(
        "size unchanged after no-op truncate",
        r == 0 && stat[7] == 5,
        &format!("size {}", stat[7]),
    );

    let r = h.one(|b, req| b.close(req, fd));
    t.check("close", r == 0, &format!("result {}", r));

    let r = h.one(|b, req| b.rename(req, &file, &moved));
    t.check("rename", r == 0, &format!("result {}", r));

    let r = h.one(|b, req| b.chmod(req, &moved, 0o600));
    t.check("chmod 600", r == 0, &format!("result {}", r));

    let r = {
        let req = Arc::new(FsRequest::new(RequestId::new(0)));
        unsafe { h.bridge.stat(&req, &moved, &mut stat).unwrap() };
        h.wait(1).map(|e| e[0].1).unwrap_or(i32::MIN)
    };
    t.check(
        "stat reflects chmod",
        r == 0 && stat[1] as u32 & 0o777 == 0o600,
        &format!("mode {:o}", stat[1]),
    );

    let r = h.one(|b, req| b.unlink(req, &moved));
    t.check("unlink", r == 0, &format!("result {}", r));

    let mut sentinel = [u64::MAX; 16];
    let r = {
        let req = Arc::new(FsRequest::new(RequestId::new(0)));
        unsafe { h.bridge.stat(&req, &moved, &mut sentinel).unwrap() };
        h.wait(1).map(|e| e[0].1).unwrap_or(i32::MIN)
    };
    t.check(
        "stat after unlink is -ENOENT",
        r == -consts::ENOENT,
        &format!("result {}", r),
    );
    t.check(
        "failed stat leaves buffer untouched",
        sentinel == [u64::MAX; 16],
        "buffer written",
    );
}

// ════════════════════════════════════════════════════════════
// Part C: Concurrency
// ════════════════════════════════════════════════════════════

fn test_concurrency(t: &mut TestRunner, h: &mut Harness, dir: &str) {
    t.section("Part C: Concurrent records");

    let present = format!("{}/present", dir);
    let fd = h.one(|b, r| b.open(r, &present, consts::O_RDWR | consts::O_CREAT, 0o644));
    if fd < 0 {
        t.fail("setup: create probe file", &format!("result {}", fd));
        return;
    }
    h.one(|b, r| b.close(r, fd as u32));
    h.seen = h.events.lock().unwrap().len();

    let n = 16u32;
    let mut records = Vec::new();
    for i in 1..=n {
        let req = Arc::new(FsRequest::new(RequestId::new(i)));
        let target = if i % 2 == 0 {
            present.clone()
        } else {
            format!("{}/missing-{}", dir, i)
        };
        if let Err(e) = h.bridge.unlink(&req, &target) {
            t.fail("submit 16 records", &format!("{}", e));
            return;
        }
        records.push(req);
        // Every other target exists, so results interleave arbitrarily.
    }

    match h.wait(n as usize) {
        Some(mut events) => {
            events.sort_by_key(|(id, _)| *id);
            let unique = events.windows(2).all(|w| w[0].0 != w[1].0);
            t.check(
                "each id completes exactly once",
                unique && events.len() == n as usize,
                "duplicate or missing id",
            );
            let verdicts = events.iter().all(|(id, result)| {
                if id % 2 == 0 {
                    *result == 0 || *result == -consts::ENOENT
                } else {
                    *result == -consts::ENOENT
                }
            });
            t.check("results match targets", verdicts, "unexpected result code");
        }
        None => t.fail("16 concurrent completions", "timed out"),
    }

    let idle = records.iter().all(|r| !r.in_flight());
    t.check("all records back to idle", idle, "record stuck in flight");

    // Reuse the first record immediately.
    let req = records.remove(0);
    let missing = format!("{}/missing-again", dir);
    let ok = h.bridge.unlink(&req, &missing).is_ok();
    let r = h.wait(1).map(|e| e[0].1).unwrap_or(i32::MIN);
    t.check(
        "record reuse after completion",
        ok && r == -consts::ENOENT,
        &format!("result {}", r),
    );

    // Busy detection while in flight.
    h.bridge.unlink(&req, &missing).unwrap();
    let busy = h.bridge.unlink(&req, &missing);
    t.check(
        "resubmit while in flight is rejected",
        matches!(busy, Err(BridgeError::RequestBusy)),
        "no RequestBusy error",
    );
    h.wait(1);

    println!(
        "    stat field count: {}  workers: {}",
        StatRecord::FIELD_COUNT,
        h.bridge.workers()
    );
}

fn main() {
    println!("fsbridge smoke test");

    let dir = std::env::temp_dir().join(format!("fsbridge-smoke-{}", std::process::id()));
    let dir_str = dir.to_string_lossy().to_string();

    let mut t = TestRunner::new();
    test_layout(&mut t);

    let mut h = match Harness::new() {
        Ok(h) => h,
        Err(e) => {
            println!("\nFATAL: bridge construction failed: {}", e);
            t.summary();
            std::process::exit(1);
        }
    };

    let r = h.one(|b, req| b.mkdir(req, &dir_str, 0o755));
    if r != 0 {
        println!("\nFATAL: scratch mkdir failed: {}", r);
        t.summary();
        std::process::exit(1);
    }

    test_lifecycle(&mut t, &mut h, &dir_str);
    test_concurrency(&mut t, &mut h, &dir_str);

    // Scratch cleanup through the bridge itself.
    let _ = h.one(|b, req| b.unlink(req, &format!("{}/present", dir_str)));
    let r = h.one(|b, req| b.rmdir(req, &dir_str));
    t.check("scratch rmdir", r == 0, &format!("result {}", r));

    t.summary();
    std::process::exit(if t.failed > 0 { 1 } else { 0 });
}
