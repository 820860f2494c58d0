mod support;

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use payslip_harvest::config::{Config, OutputMode};
use payslip_harvest::error::{AppError, ConversionError};
use payslip_harvest::infrastructure::{MemoryStateStore, PortalPage, StateStore, WorkflowStateStore};
use payslip_harvest::models::{DocumentDescriptor, TableCell, TableRow, WorkflowState};
use payslip_harvest::orchestrator::{
    BatchConversionPipeline, ConversionJob, Harvester, OutputPlan, PipelineSettings,
};
use payslip_harvest::services::ReadinessWaiter;

use support::*;

const LABELS: [&str; 4] = ["15/07/2024", "29/07/2024", "12/08/2024", "26/08/2024"];

struct Rig {
    portal: Arc<FakePortal>,
    state: Arc<MemoryStateStore>,
    fetcher: FakeFetcher,
    saver: Arc<MemorySaver>,
    harvester: Harvester,
}

fn rig(config: &Config, portal: FakePortal, fetcher: FakeFetcher, renderer: FakeRenderer) -> Rig {
    rig_with_cancel(config, portal, fetcher, renderer, CancellationToken::new())
}

fn rig_with_cancel(
    config: &Config,
    portal: FakePortal,
    fetcher: FakeFetcher,
    renderer: FakeRenderer,
    cancel: CancellationToken,
) -> Rig {
    let portal = Arc::new(portal);
    let state = Arc::new(MemoryStateStore::new());
    let saver = Arc::new(MemorySaver::new());

    let mut pipeline = BatchConversionPipeline::new(
        Arc::new(fetcher.clone()),
        Arc::new(renderer),
        PipelineSettings::from_config(config),
        cancel.clone(),
    );
    if config.output_mode == OutputMode::PerFile {
        pipeline = pipeline.with_immediate_save(saver.clone());
    }

    let harvester = Harvester::new(
        config,
        portal.clone(),
        WorkflowStateStore::new(state.clone(), config.state_ttl()),
        ReadinessWaiter::new(Duration::from_millis(5), Duration::from_millis(300)),
        pipeline,
        OutputPlan {
            mode: config.output_mode,
            target: saver.clone(),
            duplicate_policy: config.duplicate_policy,
        },
        cancel,
    );

    Rig {
        portal,
        state,
        fetcher,
        saver,
        harvester,
    }
}

fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            (file.name().to_string(), content)
        })
        .collect()
}

#[tokio::test]
async fn four_payslips_end_up_in_one_archive() {
    let config = test_config();
    let rig = rig(
        &config,
        FakePortal::at(ENTRY_URL, "12345 Smith, John Alan", listing_rows(&LABELS)),
        FakeFetcher::new(),
        FakeRenderer::new(),
    );

    let summary = rig.harvester.run().await.unwrap();

    assert_eq!(summary.descriptors, 4);
    assert_eq!(summary.converted, 4);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.output.as_deref(), Some("memory://payslips.zip"));

    let redirects = rig.portal.redirects();
    assert_eq!(redirects.len(), 1);
    assert_eq!(
        redirects[0].as_str(),
        "https://payroll.ascenderpay.com/ords/wss_vzbp/WK8020VZ$.startup?Z_EMPLOYEE_NUMBER=12345&P_MODE=R"
    );

    let files = rig.saver.files();
    assert_eq!(files.len(), 1);
    let entries = zip_entries(&files[0].1);
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        ["15-07-2024.pdf", "29-07-2024.pdf", "12-08-2024.pdf", "26-08-2024.pdf"]
    );
    assert_eq!(entries[0].1, b"%PDF-1.4 15/07/2024".to_vec());

    // 终态已消费状态
    assert_eq!(rig.state.read().await.unwrap(), None);
}

#[tokio::test]
async fn extra_leading_row_is_reported_and_documents_still_convert() {
    let config = test_config();
    // 标题行 + 汇总行 + 一行没有期末日期列的小计，再加 4 个工资单
    let mut rows = listing_rows(&LABELS);
    rows.insert(2, TableRow::new(vec![TableCell::text("Pay Period Totals")]));
    let rig = rig(
        &config,
        FakePortal::at(LISTING_URL, "12345 Smith, John", rows),
        FakeFetcher::new().with_delay(Duration::from_millis(10)),
        FakeRenderer::new(),
    );

    let summary = rig.harvester.run().await.unwrap();

    assert_eq!(summary.descriptors, 4);
    assert_eq!(summary.row_errors, 1);
    assert_eq!(summary.converted, 4);

    // 4 个文档在同一批：全部开始之后才有完成
    let events = rig.fetcher.events();
    assert_eq!(rig.fetcher.calls(), 4);
    assert!(events[..4].iter().all(|e| matches!(e, Event::Start(_))), "{events:?}");

    let entries = zip_entries(&rig.saver.files()[0].1);
    assert_eq!(entries.len(), 4);
}

#[tokio::test]
async fn malformed_identity_stops_before_redirect() {
    let config = test_config();
    let rig = rig(
        &config,
        FakePortal::at(ENTRY_URL, "Smith John", listing_rows(&LABELS)),
        FakeFetcher::new(),
        FakeRenderer::new(),
    );

    let err = rig.harvester.run().await.unwrap_err();

    assert!(matches!(err, AppError::NavigationPrecondition(_)), "{err}");
    assert!(rig.portal.redirects().is_empty());
    assert_eq!(rig.state.read().await.unwrap(), None);
    assert_eq!(rig.fetcher.calls(), 0);
}

#[tokio::test]
async fn failed_redirect_leaves_no_state() {
    let config = test_config();
    let rig = rig(
        &config,
        FakePortal::at(ENTRY_URL, "12345 Smith, John", listing_rows(&LABELS)).failing_redirect(),
        FakeFetcher::new(),
        FakeRenderer::new(),
    );

    assert!(rig.harvester.run().await.is_err());
    assert_eq!(rig.state.read().await.unwrap(), None);
}

#[tokio::test]
async fn listing_timeout_clears_state() {
    let config = test_config();
    let rig = rig(
        &config,
        FakePortal::at(ENTRY_URL, "12345 Smith, John", listing_rows(&LABELS)).stuck_redirect(),
        FakeFetcher::new(),
        FakeRenderer::new(),
    );

    let err = rig.harvester.run().await.unwrap_err();

    assert!(matches!(err, AppError::ReadinessTimeout { .. }), "{err}");
    assert_eq!(rig.portal.redirects().len(), 1);
    assert_eq!(rig.state.read().await.unwrap(), None);
}

#[tokio::test]
async fn state_is_cleared_even_when_extraction_fails() {
    let config = test_config();
    // 历史页面上没有表格：等待表格行超时
    let rig = rig(
        &config,
        FakePortal::at(LISTING_URL, "12345 Smith, John", Vec::new()),
        FakeFetcher::new(),
        FakeRenderer::new(),
    );
    let state = WorkflowState::navigated("12345", LISTING_URL);
    rig.state
        .write(&serde_json::to_string(&state).unwrap())
        .await
        .unwrap();

    let err = rig.harvester.run().await.unwrap_err();

    assert!(matches!(err, AppError::ReadinessTimeout { .. }), "{err}");
    assert_eq!(rig.state.read().await.unwrap(), None);
}

#[tokio::test]
async fn failures_stay_with_their_own_document() {
    let config = test_config();
    let rig = rig(
        &config,
        FakePortal::at(LISTING_URL, "12345 Smith, John", listing_rows(&LABELS)),
        FakeFetcher::new().failing_on(slip_url(1)),
        FakeRenderer::new().failing_on(LABELS[3]),
    );

    let summary = rig.harvester.run().await.unwrap();

    assert_eq!(summary.descriptors, 4);
    assert_eq!(summary.converted, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.discarded, 2);
    let entries = zip_entries(&rig.saver.files()[0].1);
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["15-07-2024.pdf", "12-08-2024.pdf"]);
}

#[tokio::test]
async fn dry_run_converts_nothing_and_writes_no_archive() {
    let config = Config {
        dry_run: true,
        ..test_config()
    };
    let rig = rig(
        &config,
        FakePortal::at(LISTING_URL, "12345 Smith, John", listing_rows(&LABELS)),
        FakeFetcher::new(),
        FakeRenderer::new(),
    );

    let summary = rig.harvester.run().await.unwrap();

    assert_eq!(summary.descriptors, 4);
    assert_eq!(summary.dry_run, 4);
    assert_eq!(summary.converted, 0);
    assert_eq!(summary.output, None);
    assert_eq!(summary.discarded, 4);
    assert_eq!(rig.fetcher.calls(), 0);
    assert!(rig.saver.files().is_empty());
}

#[tokio::test]
async fn per_file_mode_saves_each_payslip() {
    let config = Config {
        output_mode: OutputMode::PerFile,
        ..test_config()
    };
    let rig = rig(
        &config,
        FakePortal::at(LISTING_URL, "12345 Smith, John", listing_rows(&["30/06/2024", "30/06/2024"])),
        FakeFetcher::new(),
        FakeRenderer::new(),
    );

    let summary = rig.harvester.run().await.unwrap();

    assert_eq!(summary.converted, 2);
    assert_eq!(summary.output, None);
    let mut names = rig.saver.names();
    names.sort();
    assert_eq!(names, ["30-06-2024 (2).pdf", "30-06-2024.pdf"]);
}

#[tokio::test]
async fn page_load_limit_is_enforced() {
    let config = Config {
        max_page_loads: 1,
        ..test_config()
    };
    let rig = rig(
        &config,
        FakePortal::at(ENTRY_URL, "12345 Smith, John", listing_rows(&LABELS)),
        FakeFetcher::new(),
        FakeRenderer::new(),
    );

    let err = rig.harvester.run().await.unwrap_err();

    assert!(matches!(err, AppError::NavigationPrecondition(_)), "{err}");
    assert_eq!(rig.fetcher.calls(), 0);
}

#[tokio::test]
async fn cancelled_run_stops_waiting() {
    let config = test_config();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let rig = rig_with_cancel(
        &config,
        FakePortal::at(ENTRY_URL, "12345 Smith, John", listing_rows(&LABELS)),
        FakeFetcher::new(),
        FakeRenderer::new(),
        cancel,
    );

    let err = rig.harvester.run().await.unwrap_err();

    assert!(matches!(err, AppError::Cancelled), "{err}");
    assert!(rig.portal.redirects().is_empty());
    assert_eq!(rig.portal.current_url().await.unwrap(), ENTRY_URL);
}

// ========== 批量转换 ==========

fn jobs(count: usize) -> Vec<ConversionJob> {
    (0..count)
        .map(|i| ConversionJob {
            descriptor: DocumentDescriptor::new(url::Url::parse(&slip_url(i)).unwrap(), format!("slip {i}")),
            filename: format!("slip {i}.pdf"),
        })
        .collect()
}

fn settings(batch_size: usize) -> PipelineSettings {
    PipelineSettings {
        batch_size,
        batch_delay: Duration::from_millis(10),
        fetch_timeout: Duration::from_secs(5),
        render_timeout: Duration::from_secs(5),
        dry_run: false,
    }
}

#[tokio::test]
async fn next_batch_starts_after_previous_settles() {
    let fetcher = FakeFetcher::new()
        .with_delay(Duration::from_millis(20))
        .failing_on(slip_url(0));
    let pipeline = BatchConversionPipeline::new(
        Arc::new(fetcher.clone()),
        Arc::new(FakeRenderer::new()),
        settings(2),
        CancellationToken::new(),
    );

    let results = pipeline.run(&jobs(5)).await;

    assert_eq!(results.len(), 5);
    let labels: Vec<&str> = results.iter().map(|r| r.descriptor.label.as_str()).collect();
    assert_eq!(labels, ["slip 0", "slip 1", "slip 2", "slip 3", "slip 4"]);

    let events = fetcher.events();
    let position = |event: Event| events.iter().position(|e| *e == event).unwrap();
    for (batch, next) in [(0..2, 2..4), (2..4, 4..5)] {
        let last_finish = batch.map(|i| position(Event::Finish(slip_url(i)))).max().unwrap();
        let first_start = next.map(|i| position(Event::Start(slip_url(i)))).min().unwrap();
        assert!(last_finish < first_start, "{events:?}");
    }
    // 同一批内并发
    assert!(position(Event::Start(slip_url(1))) < position(Event::Finish(slip_url(0))));
}

#[tokio::test]
async fn cancellation_yields_one_result_per_document() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let fetcher = FakeFetcher::new();
    let pipeline = BatchConversionPipeline::new(
        Arc::new(fetcher.clone()),
        Arc::new(FakeRenderer::new()),
        settings(2),
        cancel,
    );

    let results = pipeline.run(&jobs(3)).await;

    assert_eq!(results.len(), 3);
    assert!(results
        .iter()
        .all(|r| r.error() == Some(&ConversionError::Cancelled)));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn slow_fetch_times_out_without_stopping_siblings() {
    let fetcher = FakeFetcher::new().with_delay(Duration::from_millis(200));
    let pipeline = BatchConversionPipeline::new(
        Arc::new(fetcher),
        Arc::new(FakeRenderer::new()),
        PipelineSettings {
            fetch_timeout: Duration::from_millis(20),
            ..settings(5)
        },
        CancellationToken::new(),
    );

    let results = pipeline.run(&jobs(2)).await;

    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(matches!(
            result.error(),
            Some(ConversionError::Timeout { stage: "下载", .. })
        ));
    }
}

#[tokio::test]
#[ignore] // 需要已登录门户的浏览器（--remote-debugging-port=9222）：cargo test -- --ignored
async fn harvest_from_live_browser() {
    payslip_harvest::logger::init(true);
    let config = Config {
        dry_run: true,
        ..Config::load().expect("加载配置失败")
    };

    let summary = payslip_harvest::App::initialize(config, CancellationToken::new())
        .await
        .expect("初始化失败")
        .run()
        .await
        .expect("运行失败");

    println!("{:?}", summary);
}
