use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::num::ParseFloatError;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use ratatui::buffer::Buffer;
use ratatui::crossterm::event::{KeyCode, KeyModifiers};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::symbols::Marker;
use ratatui::text::Line;
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Widget};
use ratatui::Frame;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::ImageData;
use crate::cli::{is_stdio, runtime, OllamaArgs, DEFAULT_IMAGE_PROMPT};
use crate::convert::convert_terminal_text_to_image;
use crate::core::command::Command;
use crate::core::component::Component;
use crate::core::config;
use crate::core::message::Msg;
use crate::core::session::Session;
use crate::logging;
use crate::ui::chat_panel::ChatPanel;
use crate::ui::program::Program;
use crate::utils::ansi::buffer_to_ansi;

const PLACEHOLDER: &str = "Prompt about the chart...";
const DEFAULT_CHART_WIDTH: u16 = 20;
const DEFAULT_CHART_HEIGHT: u16 = 10;

/// Epoch values below this are seconds; each further factor of 1000 moves
/// one unit finer.
const BIGGEST_SECONDS: i64 = 5_000_000_000;

#[derive(Parser, Debug)]
#[command(name = "otui-timechart", disable_help_flag = true)]
#[command(about = "Chart a CSV time series and ask Ollama about it")]
#[command(long_about = "A mini-TUI for generating an Ollama response from a simple CSV file.\n\n\
Each row is `date,value` where the date is YYYY-MM-DD or an epoch number in seconds, \
milliseconds, microseconds or nanoseconds. A leading header row is skipped.\n\n\
The chart is attached as an image to every prompt. The default prompt is:\n  \
Describe this image for a visually impaired person\n\n\
Example:  otui-timechart --in prices.csv.zst -t 'Daily close' -m llava")]
pub struct Args {
    /// Input CSV filename ('-' is stdin)
    #[arg(short = 'i', long = "in", value_name = "FILE")]
    pub input: String,

    /// Prompt for Ollama (see --help for the default)
    #[arg(short = 'p', long)]
    pub prompt: Option<String>,

    /// Title for the chart
    #[arg(short = 't', long, default_value = "")]
    pub title: String,

    /// Input is zstd compressed (implied by a .zst or .zstd suffix)
    #[arg(short = 'z', long)]
    pub zstd: bool,

    /// Draw with braille dots instead of block dots
    #[arg(short = 'b', long)]
    pub braille: bool,

    /// Append logs to this file
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    #[command(flatten)]
    pub ollama: OllamaArgs,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

#[derive(Debug, Error)]
pub enum TimechartError {
    #[error("not enough columns in CSV record")]
    NotEnoughColumns,

    #[error("bad date: '{0}'")]
    BadDate(String),

    #[error("bad float: '{value}' {source}")]
    BadFloat {
        value: String,
        source: ParseFloatError,
    },

    #[error("failed to open input file {path}: {source}")]
    Open { path: String, source: io::Error },

    #[error("failed to start zstd decoder: {0}")]
    Zstd(io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimePoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

/// Parse `YYYY-MM-DD`, or an epoch number whose unit is guessed from its
/// magnitude.
pub fn parse_date(text: &str) -> Result<DateTime<Utc>, TimechartError> {
    let bad = || TimechartError::BadDate(text.to_string());

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc())
            .ok_or_else(bad);
    }

    let epoch: i64 = text.parse().map_err(|_| bad())?;
    let parsed = if epoch < BIGGEST_SECONDS {
        DateTime::from_timestamp(epoch, 0)
    } else if epoch < BIGGEST_SECONDS * 1_000 {
        DateTime::from_timestamp_millis(epoch)
    } else if epoch < BIGGEST_SECONDS * 1_000_000 {
        DateTime::from_timestamp_micros(epoch)
    } else {
        Some(DateTime::from_timestamp_nanos(epoch))
    };
    parsed.ok_or_else(bad)
}

fn parse_record(record: &csv::StringRecord) -> Result<TimePoint, TimechartError> {
    let (Some(date), Some(value)) = (record.get(0), record.get(1)) else {
        return Err(TimechartError::NotEnoughColumns);
    };
    let time = parse_date(date)?;
    let value = value
        .parse::<f64>()
        .map_err(|source| TimechartError::BadFloat {
            value: value.to_string(),
            source,
        })?;
    Ok(TimePoint { time, value })
}

/// Read `date,value` rows. Short rows are an error; rows that fail to
/// parse are skipped.
pub fn read_points<R: Read>(reader: R) -> Result<Vec<TimePoint>, TimechartError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut points = Vec::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        if record.len() < 2 {
            return Err(TimechartError::NotEnoughColumns);
        }
        if row == 0 && !record[0].starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        match parse_record(&record) {
            Ok(point) => points.push(point),
            Err(err) => debug!(row, error = %err, "skipping CSV row"),
        }
    }
    Ok(points)
}

/// Open `path` (or stdin for `-`), decompressing zstd when asked to or when
/// the name ends in `.zst`/`.zstd`.
pub fn open_reader(path: &str, zstd: bool) -> Result<Box<dyn Read>, TimechartError> {
    let raw: Box<dyn Read> = if is_stdio(Some(path)) {
        Box::new(io::stdin())
    } else {
        let file = File::open(path).map_err(|source| TimechartError::Open {
            path: path.to_string(),
            source,
        })?;
        Box::new(BufReader::new(file))
    };

    if zstd || path.ends_with(".zst") || path.ends_with(".zstd") {
        let decoder = zstd::stream::read::Decoder::new(raw).map_err(TimechartError::Zstd)?;
        Ok(Box::new(decoder))
    } else {
        Ok(raw)
    }
}

/// Data bounds, widened when every point shares a coordinate.
fn bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (min, max) = values.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min > max {
        [0.0, 1.0]
    } else if min == max {
        [min - 1.0, max + 1.0]
    } else {
        [min, max]
    }
}

pub struct TimechartApp {
    pub panel: ChatPanel,
    pub title: String,
    pub braille: bool,

    data: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    chart_width: u16,
    chart_height: u16,
}

impl TimechartApp {
    pub fn new(session: Session, points: &[TimePoint]) -> Self {
        let data: Vec<(f64, f64)> = points
            .iter()
            .map(|point| (point.time.timestamp_millis() as f64 / 1000.0, point.value))
            .collect();
        let x_bounds = bounds(data.iter().map(|(x, _)| *x));
        let y_bounds = bounds(data.iter().map(|(_, y)| *y));

        let mut panel = ChatPanel::new(session);
        panel.set_placeholder(PLACEHOLDER);

        Self {
            panel,
            title: String::new(),
            braille: false,
            data,
            x_bounds,
            y_bounds,
            chart_width: DEFAULT_CHART_WIDTH,
            chart_height: DEFAULT_CHART_HEIGHT,
        }
    }

    pub fn chart_size(&self) -> (u16, u16) {
        (self.chart_width, self.chart_height)
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.panel.set_size(self.panel.width(), height.saturating_sub(1));
        self.chart_width = width.saturating_sub(self.panel.width()).saturating_sub(2);
        self.chart_height = height.saturating_sub(3);
    }

    fn x_label(&self, seconds: f64) -> String {
        DateTime::from_timestamp(seconds as i64, 0)
            .map(|time| time.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }

    fn chart(&self) -> Chart<'_> {
        let marker = if self.braille {
            Marker::Braille
        } else {
            Marker::Dot
        };
        let dataset = Dataset::default()
            .marker(marker)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Green))
            .data(&self.data);

        let axis_style = Style::default().fg(Color::Yellow);
        let label_style = Style::default().fg(Color::Cyan);
        let [x_min, x_max] = self.x_bounds;
        let [y_min, y_max] = self.y_bounds;

        let x_axis = Axis::default()
            .style(axis_style)
            .bounds(self.x_bounds)
            .labels([self.x_label(x_min), self.x_label(x_max)].map(|label| {
                Line::styled(label, label_style)
            }));
        let y_axis = Axis::default()
            .style(axis_style)
            .bounds(self.y_bounds)
            .labels(
                [y_min, (y_min + y_max) / 2.0, y_max]
                    .map(|value| Line::styled(format!("{value:.2}"), label_style)),
            );

        Chart::new(vec![dataset]).x_axis(x_axis).y_axis(y_axis)
    }

    /// The title and chart as the PNG that goes along with a prompt.
    pub fn chart_image(&self) -> Result<Vec<u8>, Box<dyn Error>> {
        let area = Rect::new(0, 0, self.chart_width.max(1), self.chart_height.max(1));
        let mut buffer = Buffer::empty(area);
        self.chart().render(area, &mut buffer);

        let mut text = String::new();
        if !self.title.is_empty() {
            text.push_str(&self.title);
            text.push('\n');
        }
        text.push_str(&buffer_to_ansi(&buffer));
        Ok(convert_terminal_text_to_image(&text, None)?)
    }
}

impl Component for TimechartApp {
    fn init(&mut self) -> Command {
        self.panel.init()
    }

    fn update(&mut self, msg: &Msg) -> Command {
        match msg {
            Msg::Resize { width, height } => {
                self.resize(*width, *height);
                return Command::None;
            }
            Msg::Key(key)
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                return Command::Quit;
            }
            Msg::StartGenerate { id } if *id == self.panel.session.id() => {
                match self.chart_image() {
                    Ok(png) => self.panel.session.images = vec![ImageData(png)],
                    Err(err) => warn!(error = %err, "could not render chart image"),
                }
            }
            Msg::GenerateDone { id, context, .. } if *id == self.panel.session.id() => {
                self.panel.session.context = context.clone();
            }
            _ => {}
        }
        self.panel.update(msg)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(self.panel.width())])
            .split(area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Indexed(63)));
        let inner = block.inner(columns[0]);
        frame.render_widget(block, columns[0]);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(u16::from(!self.title.is_empty())),
                Constraint::Min(0),
            ])
            .split(inner);
        frame.render_widget(Paragraph::new(self.title.as_str()), rows[0]);
        frame.render_widget(self.chart(), rows[1]);

        self.panel.render(frame, columns[1]);
    }
}

pub fn run(args: Args) -> Result<ExitCode, Box<dyn Error>> {
    if let Some(path) = &args.log {
        logging::init(args.ollama.verbose, Some(path))?;
    }

    let prompt = args
        .prompt
        .filter(|prompt| !prompt.is_empty())
        .or_else(|| Some(config::default_prompt()).filter(|prompt| !prompt.is_empty()))
        .unwrap_or_else(|| DEFAULT_IMAGE_PROMPT.to_string());
    info!(host = %args.ollama.host, model = %args.ollama.model, prompt = %prompt, "timechart");

    let points = read_points(open_reader(&args.input, args.zstd)?)?;
    info!(points = points.len(), "loaded time series");

    let mut session = Session::new();
    session.host = args.ollama.host;
    session.model = args.ollama.model;
    session.prompt = String::new();

    let mut app = TimechartApp::new(session, &points);
    app.title = args.title;
    app.braille = args.braille;
    app.panel.set_input_value(&prompt);

    runtime()?.block_on(Program::new(app).run())?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{render_to_string, FakeTransport, GenerateScript, Harness};
    use chrono::{Datelike, Timelike};
    use ratatui::crossterm::event::KeyEvent;
    use std::sync::Arc;
    use tempfile::TempDir;

    const SERIES: &str = "date,close\n2024-01-02,10.5\n2024-01-03,11.25\n2024-01-04,9.75\n";

    #[test]
    fn dates_and_epoch_units_parse() {
        let day = parse_date("2024-03-15").expect("date");
        assert_eq!((day.year(), day.month(), day.day()), (2024, 3, 15));
        assert_eq!(day.hour(), 0);

        let seconds = parse_date("1700000000").expect("seconds");
        assert_eq!(seconds.timestamp(), 1_700_000_000);

        let millis = parse_date("1700000000123").expect("millis");
        assert_eq!(millis.timestamp_millis(), 1_700_000_000_123);

        let micros = parse_date("1700000000123456").expect("micros");
        assert_eq!(micros.timestamp_micros(), 1_700_000_000_123_456);

        let nanos = parse_date("1700000000123456789").expect("nanos");
        assert_eq!(nanos.timestamp_nanos_opt(), Some(1_700_000_000_123_456_789));

        assert!(matches!(parse_date("soon"), Err(TimechartError::BadDate(_))));
    }

    #[test]
    fn header_is_skipped_and_bad_rows_dropped() {
        let points = read_points(
            "date,close\n2024-01-02,10.5\nnot-a-date,3\n2024-01-04,NaNish\n2024-01-05,7\n"
                .as_bytes(),
        )
        .expect("points");
        let values: Vec<f64> = points.iter().map(|point| point.value).collect();
        assert_eq!(values, vec![10.5, 7.0]);
    }

    #[test]
    fn numeric_first_row_is_data() {
        let points = read_points("1700000000,1\n1700086400,2\n".as_bytes()).expect("points");
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn short_rows_are_an_error() {
        let err = read_points("2024-01-02,1\n2024-01-03\n".as_bytes()).expect_err("short row");
        assert!(matches!(err, TimechartError::NotEnoughColumns));
        assert_eq!(err.to_string(), "not enough columns in CSV record");
    }

    #[test]
    fn zstd_input_is_detected_by_suffix() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("series.csv.zst");
        let compressed = zstd::encode_all(SERIES.as_bytes(), 0).expect("compress");
        std::fs::write(&path, compressed).expect("write");

        let reader = open_reader(path.to_str().expect("utf-8"), false).expect("open");
        let points = read_points(reader).expect("points");
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].value, 11.25);
    }

    #[test]
    fn missing_input_names_the_file() {
        let err = open_reader("/no/such/series.csv", false)
            .err()
            .expect("missing file");
        assert!(err.to_string().contains("/no/such/series.csv"));
    }

    fn app_with(fake: &Arc<FakeTransport>) -> TimechartApp {
        let mut session = Session::with_transport(fake.clone());
        session.host = "http://localhost:11434".to_string();
        session.model = "llava:7b".to_string();
        session.prompt = String::new();
        let points = read_points(SERIES.as_bytes()).expect("points");
        let mut app = TimechartApp::new(session, &points);
        app.title = "Daily close".to_string();
        app
    }

    #[test]
    fn resize_splits_between_chart_and_panel() {
        let mut app = app_with(&FakeTransport::new());
        app.update(&Msg::Resize {
            width: 100,
            height: 30,
        });
        assert_eq!(app.panel.height(), 29);
        assert_eq!(app.chart_size(), (100 - app.panel.width() - 2, 27));
    }

    #[tokio::test]
    async fn prompting_attaches_the_chart_and_keeps_context() {
        let fake = FakeTransport::new();
        fake.push_generate(GenerateScript::chunks(&["Prices dipped", " then recovered."]));
        let mut app = app_with(&fake);
        app.update(&Msg::Resize {
            width: 90,
            height: 24,
        });

        let mut harness = Harness::new();
        harness.run(app.init());
        app.panel.set_input_value(DEFAULT_IMAGE_PROMPT);
        harness.run(app.update(&Msg::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))));
        harness
            .drive(&mut app, |msg| matches!(msg, Msg::GenerateDone { .. }))
            .await;

        let requests = fake.generate_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, DEFAULT_IMAGE_PROMPT);
        assert_eq!(requests[0].images.len(), 1);
        assert_eq!(&requests[0].images[0].0[..8], b"\x89PNG\r\n\x1a\n");

        assert_eq!(app.panel.session.response(), "Prices dipped then recovered.");
        assert_eq!(app.panel.session.context, Some(vec![1, 2, 3]));
    }

    #[test]
    fn chart_image_is_deterministic() {
        let app = app_with(&FakeTransport::new());
        let first = app.chart_image().expect("png");
        let second = app.chart_image().expect("png");
        assert_eq!(first, second);
    }

    #[test]
    fn renders_title_and_placeholder() {
        let mut app = app_with(&FakeTransport::new());
        app.update(&Msg::Resize {
            width: 80,
            height: 20,
        });
        let screen = render_to_string(&app, 80, 20);
        assert!(screen.contains("Daily close"));
        assert!(screen.contains(PLACEHOLDER));
    }

    #[test]
    fn ctrl_c_quits() {
        let mut app = app_with(&FakeTransport::new());
        let command = app.update(&Msg::Key(KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL,
        )));
        assert!(matches!(command, Command::Quit));
    }
}
