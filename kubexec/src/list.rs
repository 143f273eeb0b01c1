//! Tables of pods and jobs for the terminal.

use std::{
    borrow::Cow,
    io::{self, IsTerminal, Write},
    time::Duration,
};

use comfy_table::{modifiers, presets, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use time::{macros::format_description, OffsetDateTime};

use crate::{
    cancel::Cancellation,
    cluster::Cluster,
    executor::JobSummary,
    kubectl::{JobState, Pod, PodPhase},
    template::APP_SELECTOR,
    time_ext::{self, OffsetDateTimeExt},
    Result,
};

pub const WATCH_INTERVAL: Duration = Duration::from_secs(5);

const MAX_IMAGE_WIDTH: usize = 30;

#[derive(Debug, Clone, Copy, Default)]
pub struct PodListOptions {
    /// Adds the node and image columns.
    pub show_all: bool,
    pub running_only: bool,
    /// Only pods created by kubexec.
    pub kubexec_only: bool,
}

/// Colour of a pod's phase. A running pod that has restarted is a warning.
pub fn status_color(phase: PodPhase, restarts: u32) -> Color {
    match phase {
        PodPhase::Running if restarts == 0 => Color::Green,
        PodPhase::Running | PodPhase::Pending => Color::Yellow,
        PodPhase::Succeeded => Color::Blue,
        PodPhase::Failed => Color::Red,
        PodPhase::Unknown => Color::White,
    }
}

/// Long image references are cut down to their last two path segments, or truncated when there is only one.
pub fn shorten_image(image: &str) -> Cow<str> {
    if image.chars().count() <= MAX_IMAGE_WIDTH {
        return Cow::Borrowed(image);
    }
    match image.rsplitn(3, '/').collect::<Vec<_>>().as_slice() {
        [last, second_last, ..] => Cow::Owned(format!("{second_last}/{last}")),
        _ => Cow::Owned(format!(
            "{}...",
            image.chars().take(MAX_IMAGE_WIDTH).collect::<String>()
        )),
    }
}

fn paint(text: &str, sgr: &str) -> String {
    if io::stdout().is_terminal() {
        format!("\x1b[{sgr}m{text}\x1b[0m")
    } else {
        text.to_owned()
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header<'a, I: IntoIterator<Item = &'a str>>(names: I) -> Vec<Cell> {
    names
        .into_iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

pub fn pod_table(pods: &[Pod], show_all: bool, now: OffsetDateTime) -> Table {
    let mut table = new_table();
    let mut columns = vec!["NAME", "STATUS", "RESTARTS", "AGE"];
    if show_all {
        columns.extend(["NODE", "IMAGE"]);
    }
    table.set_header(header(columns));

    for pod in pods {
        let restarts = pod.restarts();
        let phase = pod.status.phase;
        let mut row = vec![
            Cell::new(&pod.metadata.name).add_attribute(Attribute::Bold),
            Cell::new(phase)
                .fg(status_color(phase, restarts))
                .set_alignment(CellAlignment::Center),
            Cell::new(restarts)
                .fg(if restarts > 0 { Color::Red } else { Color::Green })
                .set_alignment(CellAlignment::Center),
            Cell::new(
                pod.metadata
                    .creation_timestamp
                    .map_or_else(|| "unknown".to_owned(), |created| time_ext::format_age(created, now)),
            )
            .set_alignment(CellAlignment::Center),
        ];
        if show_all {
            row.push(
                Cell::new(pod.spec.node_name.as_deref().unwrap_or("pending"))
                    .add_attribute(Attribute::Dim),
            );
            row.push(
                Cell::new(pod.image().map_or(Cow::Borrowed("unknown"), shorten_image))
                    .add_attribute(Attribute::Dim),
            );
        }
        table.add_row(row);
    }
    table
}

/// The pod listing as printed, or a notice when nothing matches.
pub fn render_pods(
    mut pods: Vec<Pod>,
    namespace: &str,
    options: PodListOptions,
    now: OffsetDateTime,
) -> String {
    if options.running_only {
        pods.retain(|pod| pod.status.phase == PodPhase::Running);
    }
    if pods.is_empty() {
        let filter = if options.kubexec_only {
            " kubexec"
        } else if options.running_only {
            " running"
        } else {
            ""
        };
        return paint(
            &format!("No{filter} pods found in namespace '{namespace}'"),
            "33",
        );
    }
    format!(
        "Pods in namespace: {}\n{}",
        paint(namespace, "1;36"),
        pod_table(&pods, options.show_all, now)
    )
}

fn fetch_pods(cluster: &dyn Cluster, namespace: &str, options: PodListOptions) -> Result<Vec<Pod>> {
    cluster.list_pods(namespace, options.kubexec_only.then_some(APP_SELECTOR))
}

pub fn list_pods(cluster: &dyn Cluster, namespace: &str, options: PodListOptions) -> Result<()> {
    let pods = fetch_pods(cluster, namespace, options)?;
    println!("{}", render_pods(pods, namespace, options, OffsetDateTime::now_utc()));
    Ok(())
}

/// Redraws the full pod listing every [`WATCH_INTERVAL`] until cancelled.
pub fn watch_pods(
    cluster: &dyn Cluster,
    namespace: &str,
    kubexec_only: bool,
    cancellation: &Cancellation,
) -> Result<()> {
    let options = PodListOptions {
        show_all: true,
        running_only: false,
        kubexec_only,
    };
    let clock = format_description!("[hour]:[minute]:[second]");

    println!(
        "{} (press Ctrl+C to stop)\n",
        paint(&format!("Watching pods in namespace '{namespace}'"), "1;34")
    );
    while !cancellation.is_cancelled() {
        let pods = fetch_pods(cluster, namespace, options)?;
        let now = OffsetDateTime::now_utc();
        let local = now.to_local().unwrap_or(now);

        // Clear the screen and move the cursor home.
        print!("\x1b[2J\x1b[H");
        println!(
            "{}\n",
            paint(
                &format!("Last updated: {}", local.format(clock).unwrap_or_default()),
                "2"
            )
        );
        println!("{}", render_pods(pods, namespace, options, now));
        let _ = io::stdout().flush();

        if !cancellation.sleep(WATCH_INTERVAL) {
            break;
        }
    }
    println!("\n{}", paint("Watch stopped.", "33"));
    Ok(())
}

fn job_state_color(state: JobState) -> Color {
    match state {
        JobState::Succeeded => Color::Green,
        JobState::Failed => Color::Red,
        JobState::Running => Color::Yellow,
    }
}

/// Table of kubexec jobs with creation times in local time, or UTC when the local offset is unknown.
pub fn job_table(jobs: &[JobSummary]) -> Table {
    let date = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let offset = time_ext::local_offset().unwrap_or(time::UtcOffset::UTC);
    let offset_label = offset
        .format(format_description!(
            "[offset_hour sign:mandatory]:[offset_minute]"
        ))
        .unwrap_or_default();

    let created_header = format!("CREATED ({offset_label})");

    let mut table = new_table();
    table.set_header(header(["NAME", "STATUS", "IMAGE", created_header.as_str()]));
    for job in jobs {
        let created = job
            .created
            .and_then(|created| created.to_offset(offset).format(date).ok())
            .unwrap_or_else(|| "unknown".to_owned());
        table.add_row(vec![
            Cell::new(&job.name).add_attribute(Attribute::Bold),
            Cell::new(job.state).fg(job_state_color(job.state)),
            Cell::new(&job.image),
            Cell::new(created),
        ]);
    }
    table
}
