//! End-to-end scenarios combining every component crate through
//! [`Interceptor`], using the in-memory fakes from `lazyfetch-testkit`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lazyfetch_config::Config;
use lazyfetch_context::ContextStore;
use lazyfetch_fetch::FetchEngine;
use lazyfetch_filelock::FileLockRegistry;
use lazyfetch_intercept::{Interceptor, ObservationSink, OpenDecision};
use lazyfetch_markstore::MarkStore;
use lazyfetch_platform::{AccessMask, Disposition, OpenOutcome, OpenRequest, RawMark, ReparseHost, ShareMode};
use lazyfetch_testkit::{FakeHelperDelegate, FakeLocalFile, FakeRemoteOpenBackend, FakeReparseHost};

const TAG: u32 = 0x8421_5a3c;
const GUID: [u8; 16] = [9; 16];

#[derive(Default)]
struct CountingSink {
    count: AtomicUsize,
}

impl ObservationSink for CountingSink {
    fn emit(&self, _path: &str) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

fn candidate_request(pid: u32) -> OpenRequest {
    OpenRequest {
        pid,
        access: AccessMask::READ,
        share: ShareMode::READ,
        disposition: Disposition::OpenIf,
        is_regular_file: true,
        is_directory: false,
        open_by_id: false,
        is_volume_open: false,
        is_paging_io: false,
        self_issued: false,
    }
}

fn reparse_outcome() -> OpenOutcome {
    OpenOutcome {
        reparse_encountered: true,
        created_or_overwrote: false,
    }
}

fn build(host: Arc<FakeReparseHost>) -> Interceptor<Arc<dyn ReparseHost>> {
    let config = Arc::new(Config::new());
    let host: Arc<dyn ReparseHost> = host;
    let marks = MarkStore::new(host, TAG, GUID);
    Interceptor::new(
        config,
        ContextStore::new(),
        FileLockRegistry::new(),
        marks,
        FetchEngine::new().with_chunk_size(64).with_max_chunks(2),
        Arc::new(lazyfetch_intercept::RandSampler),
        Arc::new(CountingSink::default()),
    )
}

#[tokio::test]
async fn open_of_a_stub_attaches_a_context_and_read_write_materializes_it() {
    let host = Arc::new(FakeReparseHost::new(TAG, GUID));
    host.seed_stub(
        "/v/a.bin",
        RawMark {
            remote_size: 128,
            remote_path: "//src/a.bin".into(),
        },
    );
    let interceptor = build(Arc::clone(&host));

    let (_, decision) = interceptor
        .on_open(candidate_request(111), "/v/a.bin", reparse_outcome())
        .await
        .unwrap();
    assert!(matches!(decision, OpenDecision::Attached(_)));

    let direct = FakeRemoteOpenBackend::new().with_content("//src/a.bin", vec![5u8; 128]);
    let mut local = FakeLocalFile::new();
    interceptor
        .on_read_write(111, "/v/a.bin", &mut local, &direct, None)
        .await
        .unwrap();

    assert_eq!(local.snapshot(), vec![5u8; 128]);
    assert!(!host.has_mark("/v/a.bin"));
}

#[tokio::test]
async fn trusted_pid_bypasses_both_open_and_read_write() {
    let host = Arc::new(FakeReparseHost::new(TAG, GUID));
    host.seed_stub(
        "/v/a.bin",
        RawMark {
            remote_size: 16,
            remote_path: "//src/a.bin".into(),
        },
    );
    let interceptor = build(Arc::clone(&host));
    interceptor.config().trust_pid(222);

    let (req, decision) = interceptor
        .on_open(candidate_request(222), "/v/a.bin", reparse_outcome())
        .await
        .unwrap();
    assert!(matches!(decision, OpenDecision::Passthrough));
    assert!(req.access.contains(lazyfetch_platform::AccessMask::WRITE));

    let direct = FakeRemoteOpenBackend::new();
    let mut local = FakeLocalFile::new();
    interceptor
        .on_read_write(222, "/v/a.bin", &mut local, &direct, None)
        .await
        .unwrap();
    assert!(local.snapshot().is_empty(), "trusted pid must never trigger a fetch");
}

#[tokio::test]
async fn concurrent_read_write_only_fetches_once() {
    let host = Arc::new(FakeReparseHost::new(TAG, GUID));
    host.seed_stub(
        "/v/a.bin",
        RawMark {
            remote_size: 256,
            remote_path: "//src/a.bin".into(),
        },
    );
    let interceptor = Arc::new(build(Arc::clone(&host)));
    interceptor
        .on_open(candidate_request(333), "/v/a.bin", reparse_outcome())
        .await
        .unwrap();

    let direct = Arc::new(FakeRemoteOpenBackend::new().with_content("//src/a.bin", vec![3u8; 256]));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let interceptor = Arc::clone(&interceptor);
        let direct = Arc::clone(&direct);
        let mut local = FakeLocalFile::new();
        handles.push(tokio::spawn(async move {
            interceptor
                .on_read_write(333, "/v/a.bin", &mut local, direct.as_ref(), None)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(!host.has_mark("/v/a.bin"));
}

#[tokio::test]
async fn open_on_a_helper_delegated_stub_falls_back_when_direct_is_denied() {
    let host = Arc::new(FakeReparseHost::new(TAG, GUID));
    host.seed_stub(
        "/v/b.bin",
        RawMark {
            remote_size: 8,
            remote_path: "//src/b.bin".into(),
        },
    );
    let interceptor = build(Arc::clone(&host));
    interceptor
        .on_open(candidate_request(444), "/v/b.bin", reparse_outcome())
        .await
        .unwrap();

    let direct = FakeRemoteOpenBackend::new().with_direct_access_denied("//src/b.bin");
    let helper = FakeHelperDelegate::new().with_content("//src/b.bin", vec![9u8; 8]);
    let mut local = FakeLocalFile::new();
    interceptor
        .on_read_write(444, "/v/b.bin", &mut local, &direct, Some(&helper))
        .await
        .unwrap();

    assert_eq!(local.snapshot(), vec![9u8; 8]);
}
