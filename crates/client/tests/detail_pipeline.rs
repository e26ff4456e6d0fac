//! Detail pipeline end to end over a scripted render surface.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use prts_client::render::{
    HoverSurface, Launcher, PageTab, RenderError, RenderPool, RenderSurface, TermLocator, TooltipContent,
};
use prts_client::DetailPipeline;
use prts_client::sync::{BatchOptions, CancelFlag, sync_details};
use prts_core::{AppConfig, Error, OperatorDb};

const PAGE: &str = r#"<html><body><div id="mw-content-text">
<table class="wikitable char-base-attr-table">
  <tr><th>属性</th><th>精英0 1级</th><th>精英0 满级</th><th>精英1 满级</th><th>精英2 满级</th></tr>
  <tr><th>生命上限</th><td>720</td><td>1010</td><td>1280</td><td>1580</td></tr>
  <tr><th>攻击</th><td>260</td><td>355</td><td>450</td><td>540</td></tr>
</table>
<table class="wikitable logo">
  <tr><th>分支</th><th>描述</th></tr>
  <tr><td>重剑手</td><td>攻击造成<span class="mc-tooltips">法术脆弱</span>效果</td></tr>
  <tr><th>分支信息</th></tr>
  <tr><td><ul><li>可以进行远程攻击</li></ul></td></tr>
</table>
<h2><span class="mw-headline" id="天赋">天赋</span></h2>
<table class="wikitable">
  <tr><th>天赋</th><th>条件</th><th>描述</th></tr>
  <tr><td>战术吟唱</td><td>精英1</td><td><span class="第一天赋潜能_1">攻击速度+8</span></td></tr>
</table>
<table class="wikitable"><tr><th>天赋</th></tr></table>
<h2><span class="mw-headline" id="技能">技能</span></h2>
<p>技能1（精英0开放）</p>
<table class="wikitable nomobile logo">
  <tr><td>icon</td><td><big>强力击·γ型</big></td><td><span class="mc-tooltips">自动回复</span></td></tr>
  <tr><td>1</td><td>攻击力+10%</td><td>0</td><td>4</td><td>-</td></tr>
  <tr><td>2</td><td>攻击力+20%</td><td>0</td><td>4</td><td>-</td></tr>
  <tr><td>3</td><td>攻击力+30%</td><td>0</td><td>4</td><td>-</td></tr>
  <tr><td>4</td><td>攻击力+40%</td><td>0</td><td>4</td><td>-</td></tr>
  <tr><td>5</td><td>攻击力+50%</td><td>0</td><td>4</td><td>-</td></tr>
  <tr><td>6</td><td>攻击力+60%</td><td>0</td><td>4</td><td>-</td></tr>
  <tr><td>7</td><td>攻击力+70%</td><td>0</td><td>4</td><td>-</td></tr>
  <tr><td>8</td><td>攻击力+80%</td><td>0</td><td>3</td><td>-</td></tr>
</table>
</div></body></html>"#;

/// The only term whose tooltip renders.
const KNOWN_TERM: &str = "法术脆弱";

#[derive(Default)]
struct Shared {
    launches: AtomicUsize,
    shutdowns: AtomicUsize,
    tabs_opened: AtomicUsize,
    tabs_closed: AtomicUsize,
    goto_failures: Mutex<VecDeque<RenderError>>,
    goto_delay: Duration,
    hover_crashes: AtomicUsize,
    /// Open and close instants of every closed tab.
    tab_spans: Mutex<Vec<(Instant, Instant)>>,
}

impl Shared {
    fn with_failures(failures: Vec<RenderError>) -> Arc<Self> {
        Arc::new(Self { goto_failures: Mutex::new(failures.into()), ..Self::default() })
    }
}

struct FakeLauncher(Arc<Shared>);

struct FakeSurface {
    shared: Arc<Shared>,
    alive: AtomicBool,
}

struct FakeTab {
    shared: Arc<Shared>,
    hovered: Mutex<Option<String>>,
    opened_at: Instant,
}

#[async_trait::async_trait]
impl Launcher for FakeLauncher {
    type Surface = FakeSurface;

    async fn launch(&self) -> Result<FakeSurface, RenderError> {
        self.0.launches.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSurface { shared: Arc::clone(&self.0), alive: AtomicBool::new(true) })
    }
}

#[async_trait::async_trait]
impl RenderSurface for FakeSurface {
    type Tab = FakeTab;

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn open_tab(&self) -> Result<FakeTab, RenderError> {
        self.shared.tabs_opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeTab { shared: Arc::clone(&self.shared), hovered: Mutex::new(None), opened_at: Instant::now() })
    }

    async fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.shared.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl HoverSurface for FakeTab {
    async fn ping(&self) -> Result<(), RenderError> {
        Ok(())
    }

    async fn hover(&self, target: &TermLocator) -> Result<usize, RenderError> {
        let crashes = &self.shared.hover_crashes;
        if crashes.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
            return Err(RenderError::Crashed("Target crashed".into()));
        }
        *self.hovered.lock().unwrap() = Some(target.text.clone());
        Ok(1)
    }

    async fn query_tooltip(&self, _selector: &str) -> Result<Option<TooltipContent>, RenderError> {
        let hovered = self.hovered.lock().unwrap().clone();
        Ok((hovered.as_deref() == Some(KNOWN_TERM)).then(|| TooltipContent {
            strong_texts: vec![KNOWN_TERM.to_string()],
            other_texts: vec!["受到的法术伤害提升20%".to_string()],
            full_text: format!("{KNOWN_TERM}受到的法术伤害提升20%"),
        }))
    }

    async fn reset_pointer(&self) -> Result<(), RenderError> {
        *self.hovered.lock().unwrap() = None;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PageTab for FakeTab {
    async fn goto(&self, _url: &str, _timeout: Duration) -> Result<(), RenderError> {
        if !self.shared.goto_delay.is_zero() {
            tokio::time::sleep(self.shared.goto_delay).await;
        }
        match self.shared.goto_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn wait_for_selector(&self, _selector: &str, _timeout: Duration) -> Result<(), RenderError> {
        Ok(())
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> Result<(), RenderError> {
        Ok(())
    }

    async fn content(&self) -> Result<String, RenderError> {
        Ok(PAGE.to_string())
    }

    async fn close(&self) -> Result<(), RenderError> {
        self.shared.tabs_closed.fetch_add(1, Ordering::SeqCst);
        self.shared.tab_spans.lock().unwrap().push((self.opened_at, Instant::now()));
        Ok(())
    }
}

fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.waits.tooltip_render_ms = 0;
    config.waits.pointer_reset_ms = 0;
    config.waits.settle_ms = 0;
    config.retry.retry_delay_ms = 0;
    config.retry.crash_delay_ms = 0;
    config.item_delay_ms = 0;
    config
}

#[tokio::test]
async fn test_fetch_assembles_record() {
    let shared = Shared::with_failures(Vec::new());
    let pool = RenderPool::new(FakeLauncher(Arc::clone(&shared)));
    let config = fast_config();
    let pipeline = DetailPipeline::new(&pool, &config);

    let record = pipeline.fetch("斯卡蒂").await.unwrap();

    assert_eq!(record.subject_name, "斯卡蒂");
    assert_eq!(record.base_attributes.populated().count(), 4);
    assert_eq!(record.branch_name, "重剑手");
    assert!(!record.branch_description.is_empty());
    assert_eq!(record.trait_details, "可以进行远程攻击");

    assert_eq!(record.talents.len(), 1);
    assert_eq!(record.talents[0].talent_name, "战术吟唱");

    assert_eq!(record.skills.len(), 1);
    assert_eq!(record.skills[0].skill_name, "强力击·γ型");
    assert_eq!(record.skills[0].skill_levels.len(), 1);
    assert_eq!(record.skills[0].skill_levels[0].sp_cost, "3");

    assert_eq!(record.terms.len(), 1);
    assert_eq!(record.terms[0].term_name, KNOWN_TERM);
    assert_eq!(record.terms[0].term_description, "受到的法术伤害提升20%");

    assert_eq!(shared.launches.load(Ordering::SeqCst), 1);
    assert_eq!(shared.tabs_opened.load(Ordering::SeqCst), 1);
    assert_eq!(shared.tabs_closed.load(Ordering::SeqCst), 1);
    assert!(pool.is_initialized().await);
}

#[tokio::test]
async fn test_fatal_error_relaunches_surface() {
    let shared = Shared::with_failures(vec![RenderError::Crashed("renderer gone".into())]);
    let pool = RenderPool::new(FakeLauncher(Arc::clone(&shared)));
    let config = fast_config();
    let pipeline = DetailPipeline::new(&pool, &config);

    let record = pipeline.fetch("斯卡蒂").await.unwrap();
    assert_eq!(record.skills.len(), 1);

    assert_eq!(shared.launches.load(Ordering::SeqCst), 2);
    assert_eq!(shared.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(shared.tabs_opened.load(Ordering::SeqCst), 2);
    assert_eq!(shared.tabs_closed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_crash_during_term_hover_relaunches_next_fetch() {
    let shared = Arc::new(Shared { hover_crashes: AtomicUsize::new(1), ..Shared::default() });
    let pool = RenderPool::new(FakeLauncher(Arc::clone(&shared)));
    let config = fast_config();
    let pipeline = DetailPipeline::new(&pool, &config);

    let first = pipeline.fetch("斯卡蒂").await.unwrap();
    assert!(first.terms.is_empty());
    assert_eq!(first.skills.len(), 1);
    assert!(!pool.is_initialized().await);

    let second = pipeline.fetch("斯卡蒂").await.unwrap();
    assert_eq!(second.terms.len(), 1);
    assert_eq!(shared.launches.load(Ordering::SeqCst), 2);
    assert_eq!(shared.shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_attempts_exhausted_closes_every_tab() {
    let failures = (0..3).map(|_| RenderError::timeout(Duration::from_secs(1))).collect();
    let shared = Shared::with_failures(failures);
    let pool = RenderPool::new(FakeLauncher(Arc::clone(&shared)));
    let config = fast_config();
    let pipeline = DetailPipeline::new(&pool, &config);

    let result = pipeline.fetch("斯卡蒂").await;
    assert!(matches!(result, Err(Error::RenderFailed(_))));

    assert_eq!(shared.launches.load(Ordering::SeqCst), 1);
    assert_eq!(shared.tabs_opened.load(Ordering::SeqCst), 3);
    assert_eq!(shared.tabs_closed.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_empty_name_rejected_before_launch() {
    let shared = Shared::with_failures(Vec::new());
    let pool = RenderPool::new(FakeLauncher(Arc::clone(&shared)));
    let config = fast_config();
    let pipeline = DetailPipeline::new(&pool, &config);

    assert!(matches!(pipeline.fetch("  ").await, Err(Error::InvalidInput(_))));
    assert_eq!(shared.launches.load(Ordering::SeqCst), 0);
    assert!(!pool.is_initialized().await);
}

#[tokio::test]
async fn test_sync_details_stores_and_releases() {
    let db = OperatorDb::open_in_memory().await.unwrap();
    let shared = Shared::with_failures(Vec::new());
    let pool = RenderPool::new(FakeLauncher(Arc::clone(&shared)));
    let config = fast_config();
    let pipeline = DetailPipeline::new(&pool, &config);

    let names = vec!["斯卡蒂".to_string(), " ".to_string()];
    let report = sync_details(&db, &pipeline, &names, &BatchOptions::from_config(&config)).await;

    assert_eq!(report.total, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);

    let summary = db.load_detail_summary("斯卡蒂").await.unwrap().unwrap();
    assert_eq!(summary.attr_rows, 4);
    assert_eq!(summary.talents, 1);
    assert_eq!(summary.skills, 1);
    assert_eq!(summary.skill_levels, 1);
    assert_eq!(summary.term_relations, 1);
    assert_eq!(db.count_global_terms().await.unwrap(), 1);

    assert!(!pool.is_initialized().await);
    assert_eq!(shared.shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sync_details_pauses_between_items() {
    let db = OperatorDb::open_in_memory().await.unwrap();
    let shared = Arc::new(Shared { goto_delay: Duration::from_millis(300), ..Shared::default() });
    let pool = RenderPool::new(FakeLauncher(Arc::clone(&shared)));
    let mut config = fast_config();
    config.item_delay_ms = 200;
    let pipeline = DetailPipeline::new(&pool, &config);

    let names = vec!["斯卡蒂".to_string(), "能天使".to_string()];
    let started = Instant::now();
    let report = sync_details(&db, &pipeline, &names, &BatchOptions::from_config(&config)).await;
    let elapsed = started.elapsed();
    assert_eq!(report.succeeded, 2);

    let spans = shared.tab_spans.lock().unwrap().clone();
    assert_eq!(spans.len(), 2);
    let gap = spans[1].0.duration_since(spans[0].1);
    assert!(gap >= Duration::from_millis(200), "gap between items was {gap:?}");

    // No pause after the last item.
    assert!(elapsed < Duration::from_millis(300 + 200 + 300 + 200), "batch took {elapsed:?}");
}

#[tokio::test]
async fn test_sync_details_honours_cancellation() {
    let db = OperatorDb::open_in_memory().await.unwrap();
    let shared = Shared::with_failures(Vec::new());
    let pool = RenderPool::new(FakeLauncher(Arc::clone(&shared)));
    let config = fast_config();
    let pipeline = DetailPipeline::new(&pool, &config);

    let cancel = CancelFlag::new();
    cancel.cancel();
    let options = BatchOptions { cancel, ..BatchOptions::from_config(&config) };

    let names = vec!["斯卡蒂".to_string(), "能天使".to_string()];
    let report = sync_details(&db, &pipeline, &names, &options).await;

    assert_eq!(report.total, 2);
    assert_eq!(report.succeeded + report.failed, 0);
    assert_eq!(shared.launches.load(Ordering::SeqCst), 0);
    assert!(db.list_operator_names().await.unwrap().is_empty());
}
