//! Long-running job scheduler
//!
//! Each job gets its own tokio task that sleeps until its next trigger and then runs the job
//! inline, so a job that is still busy when its next trigger passes skips that run instead of
//! stacking a second one.

use crate::config::{AppConfig, ConfigResult};
use crate::pipeline::{self, AppContext};
use crate::sources::{build_crawler, run_crawler};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, TimeZone, Weekday};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

const SUMMARIZE_EVERY: Duration = Duration::from_secs(2 * 60 * 60);
const SUMMARIZE_BATCH: i64 = 20;

/// When a job fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Every period, first run one period after start
    Every(Duration),
    /// Every day at a local wall-clock time
    DailyAt(NaiveTime),
    /// Every week on a day at a local wall-clock time
    WeeklyAt(Weekday, NaiveTime),
}

impl Trigger {
    /// Next wall-clock firing strictly after `now`; `None` for interval triggers
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let (days_ahead, time) = match *self {
            Trigger::Every(_) => return None,
            Trigger::DailyAt(time) => (0, time),
            Trigger::WeeklyAt(day, time) => {
                let today = now.weekday().num_days_from_monday() as i64;
                let target = day.num_days_from_monday() as i64;
                ((target - today).rem_euclid(7), time)
            }
        };
        let step = if matches!(self, Trigger::DailyAt(_)) { 1 } else { 7 };

        let mut date = now.date_naive() + ChronoDuration::days(days_ahead);
        // The first slot may already be past or fall into a DST gap
        for _ in 0..3 {
            let candidate = now
                .timezone()
                .from_local_datetime(&date.and_time(time))
                .earliest()
                .filter(|candidate| candidate > now);
            if candidate.is_some() {
                return candidate;
            }
            date += ChronoDuration::days(step);
        }
        None
    }
}

/// What a job does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Crawl(&'static str),
    Summarize,
    DailyBriefing,
    WeeklyBriefing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub trigger: Trigger,
    pub kind: JobKind,
}

/// The job table for `config`
pub fn build_jobs(config: &AppConfig) -> ConfigResult<Vec<Job>> {
    let mut jobs: Vec<Job> = config
        .sources
        .schedule()
        .into_iter()
        .filter(|(_, enabled, _)| *enabled)
        .map(|(name, _, hours)| Job {
            id: format!("crawl_{}", name),
            trigger: Trigger::Every(Duration::from_secs(hours * 3600)),
            kind: JobKind::Crawl(name),
        })
        .collect();

    jobs.push(Job {
        id: "summarize".to_string(),
        trigger: Trigger::Every(SUMMARIZE_EVERY),
        kind: JobKind::Summarize,
    });

    let daily_time = config.scheduler.daily_time()?;
    jobs.push(Job {
        id: "daily_briefing".to_string(),
        trigger: Trigger::DailyAt(daily_time),
        kind: JobKind::DailyBriefing,
    });

    // Wraps past midnight on the same weekday
    let weekly_time = daily_time + ChronoDuration::minutes(30);
    jobs.push(Job {
        id: "weekly_briefing".to_string(),
        trigger: Trigger::WeeklyAt(config.scheduler.weekly_day()?, weekly_time),
        kind: JobKind::WeeklyBriefing,
    });

    Ok(jobs)
}

async fn execute(ctx: &AppContext, job: &Job) {
    info!("[scheduler] Running job {}", job.id);
    let result = match job.kind {
        JobKind::Crawl(name) => {
            if let Some(crawler) = build_crawler(name, &ctx.config) {
                run_crawler(crawler.as_ref(), &ctx.db).await;
            }
            Ok(())
        }
        JobKind::Summarize => pipeline::run_summarization(ctx, SUMMARIZE_BATCH).await.map(|_| ()),
        JobKind::DailyBriefing => pipeline::run_daily_briefing(ctx).await.map(|_| ()),
        JobKind::WeeklyBriefing => pipeline::run_weekly_briefing(ctx).await.map(|_| ()),
    };
    if let Err(e) = result {
        error!("[scheduler] Job {} failed: {:#}", job.id, e);
    }
}

/// Time to wait before the next run of an interval job. Advances `anchor` past any
/// slot that was missed while the previous run was still busy.
fn interval_wait(anchor: &mut Instant, period: Duration, now: Instant, job_id: &str) -> Duration {
    let mut next = *anchor + period;
    if next < now {
        let missed = ((now - next).as_secs_f64() / period.as_secs_f64()).floor() as u32 + 1;
        warn!("[scheduler] Job {} overran, skipping {} run(s)", job_id, missed);
        next += period * missed;
    }
    *anchor = next;
    next - now
}

async fn job_loop(ctx: Arc<AppContext>, job: Job) {
    let mut anchor = Instant::now();
    loop {
        let wait = match job.trigger {
            Trigger::Every(period) => interval_wait(&mut anchor, period, Instant::now(), &job.id),
            trigger => {
                let now = chrono::Local::now();
                match trigger.next_after(&now) {
                    Some(next) => {
                        debug!("[scheduler] Job {} next run at {}", job.id, next);
                        (next - now).to_std().unwrap_or(Duration::ZERO)
                    }
                    None => {
                        error!("[scheduler] Job {} has no next run time, stopping it", job.id);
                        return;
                    }
                }
            }
        };
        sleep(wait).await;
        execute(&ctx, &job).await;
    }
}

pub struct Scheduler {
    ctx: Arc<AppContext>,
    jobs: Vec<Job>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    is_running: RwLock<bool>,
}

impl Scheduler {
    pub fn new(ctx: Arc<AppContext>) -> ConfigResult<Self> {
        let jobs = build_jobs(&ctx.config)?;
        Ok(Self {
            ctx,
            jobs,
            handles: Mutex::new(Vec::new()),
            is_running: RwLock::new(false),
        })
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Spawn one task per job
    pub async fn start(&self) {
        let mut is_running = self.is_running.write().await;
        if *is_running {
            return;
        }

        let mut handles = self.handles.lock().await;
        for job in &self.jobs {
            debug!("[scheduler] Scheduling {} ({:?})", job.id, job.trigger);
            handles.push(tokio::spawn(job_loop(self.ctx.clone(), job.clone())));
        }

        *is_running = true;
        info!("[scheduler] Started {} jobs", self.jobs.len());
    }

    /// Abort every job task, including runs in progress
    pub async fn stop(&self) {
        let mut is_running = self.is_running.write().await;
        if !*is_running {
            return;
        }
        for handle in self.handles.lock().await.drain(..) {
            handle.abort();
        }
        *is_running = false;
        info!("[scheduler] Stopped");
    }

    /// Initial crawl, then run the jobs until Ctrl-C or SIGTERM
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("Running initial crawl on startup...");
        if let Err(e) = pipeline::run_all_crawlers(&self.ctx).await {
            error!("Initial crawl failed: {:#}", e);
        }

        self.start().await;
        info!("Scheduler running. Press Ctrl+C to stop.");
        wait_for_shutdown().await?;
        info!("Shutting down scheduler...");
        self.stop().await;
        Ok(())
    }
}

#[cfg(unix)]
async fn wait_for_shutdown() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::NewsDatabase;
    use chrono::Utc;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_daily_trigger() {
        let trigger = Trigger::DailyAt(hm(8, 0));
        // 2026-10-16 is a Friday
        assert_eq!(trigger.next_after(&at(2026, 10, 16, 7, 59)), Some(at(2026, 10, 16, 8, 0)));
        assert_eq!(trigger.next_after(&at(2026, 10, 16, 8, 0)), Some(at(2026, 10, 17, 8, 0)));
        assert_eq!(trigger.next_after(&at(2026, 12, 31, 9, 0)), Some(at(2027, 1, 1, 8, 0)));
    }

    #[test]
    fn test_weekly_trigger() {
        let trigger = Trigger::WeeklyAt(Weekday::Mon, hm(8, 30));
        assert_eq!(trigger.next_after(&at(2026, 10, 16, 12, 0)), Some(at(2026, 10, 19, 8, 30)));
        assert_eq!(trigger.next_after(&at(2026, 10, 19, 8, 0)), Some(at(2026, 10, 19, 8, 30)));
        assert_eq!(trigger.next_after(&at(2026, 10, 19, 8, 30)), Some(at(2026, 10, 26, 8, 30)));
        assert_eq!(Trigger::Every(Duration::from_secs(60)).next_after(&at(2026, 10, 19, 8, 30)), None);
    }

    #[test]
    fn test_build_jobs() {
        let mut config = AppConfig::default();
        config.scheduler.daily_briefing_time = "07:45".to_string();
        config.scheduler.weekly_briefing_day = "friday".to_string();
        config.sources.arxiv.enabled = false;

        let jobs = build_jobs(&config).unwrap();
        let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "crawl_github",
                "crawl_huggingface",
                "crawl_reddit",
                "crawl_hackernews",
                "crawl_leaderboard",
                "crawl_websites",
                "summarize",
                "daily_briefing",
                "weekly_briefing",
            ]
        );
        assert_eq!(jobs[0].trigger, Trigger::Every(Duration::from_secs(6 * 3600)));
        assert_eq!(jobs[7].trigger, Trigger::DailyAt(hm(7, 45)));
        // 07:45 + 30 min carries into the next hour
        assert_eq!(jobs[8].trigger, Trigger::WeeklyAt(Weekday::Fri, hm(8, 15)));
    }

    #[test]
    fn test_interval_wait_skips_missed_slots() {
        let period = Duration::from_secs(10);
        let start = Instant::now();

        let mut anchor = start;
        assert_eq!(interval_wait(&mut anchor, period, start + Duration::from_secs(4), "t"), Duration::from_secs(6));
        assert_eq!(anchor, start + period);

        // The run took 25 s: slots at 20 s and 30 s were missed
        let mut anchor = start + period;
        let wait = interval_wait(&mut anchor, period, start + Duration::from_secs(35), "t");
        assert_eq!(anchor, start + Duration::from_secs(40));
        assert_eq!(wait, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.paths.site_dir = dir.path().join("site");
        let db = NewsDatabase::new_in_memory().await.unwrap();
        let ctx = Arc::new(AppContext::new(config, Arc::new(db), None));

        let scheduler = Scheduler::new(ctx).unwrap();
        scheduler.start().await;
        scheduler.start().await;
        assert_eq!(scheduler.handles.lock().await.len(), scheduler.jobs().len());
        scheduler.stop().await;
        assert!(scheduler.handles.lock().await.is_empty());
        assert!(!*scheduler.is_running.read().await);
    }
}
