//! One-call line, bar and scatter charts over a list of frames.

use super::figure::{Annotation, Axis, Figure, Font, Legend, Line, Marker, RangeSlider, Title, Trace};
use super::ChartError;
use crate::analytics::stats::{finite, mean, median, pct_change};
use crate::frame::TimeFrame;
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde_json::Value;
use std::collections::BTreeMap;

/// Frames plotted together, one trace per frame.
#[derive(Debug, Clone)]
pub struct QuickPlot {
    frames: Vec<TimeFrame>,
    labels: Vec<String>,
}

impl QuickPlot {
    /// Every frame needs the index plus at least one value column; labels
    /// default to `Series 1..n`.
    pub fn new(frames: Vec<TimeFrame>, labels: Option<Vec<String>>) -> Result<Self, ChartError> {
        if frames.is_empty() {
            return Err(ChartError::NoFrames);
        }
        if let Some(index) = frames.iter().position(|f| f.width() == 0) {
            return Err(ChartError::TooFewColumns { index });
        }
        let labels = labels.unwrap_or_else(|| (1..=frames.len()).map(|i| format!("Series {i}")).collect());
        if labels.len() != frames.len() {
            return Err(ChartError::LabelMismatch {
                labels: labels.len(),
                frames: frames.len(),
            });
        }
        Ok(Self { frames, labels })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn figure(
        &self,
        title: &str,
        x: &str,
        y: &str,
        trace: impl Fn(Vec<Value>, Vec<f64>, &str) -> Trace,
    ) -> Result<Figure, ChartError> {
        let mut fig = Figure::new();
        for (frame, label) in self.frames.iter().zip(&self.labels) {
            let xs = axis_values(frame, x)?;
            let ys = frame.column(y)?.to_vec();
            fig.add_trace(trace(xs, ys, label));
        }
        fig.layout.title = Some(title.into());
        fig.layout.xaxis = Some(Axis::titled(x));
        fig.layout.yaxis = Some(Axis::titled(y));
        Ok(fig)
    }

    /// Lines with markers and value labels, plus a range slider.
    pub fn plot_line(&self, title: &str, x: &str, y: &str) -> Result<Figure, ChartError> {
        let mut fig = self.figure(title, x, y, |xs, ys, label| {
            let text = ys.iter().map(|v| format_value(*v)).collect();
            let mut trace = Trace::scatter(xs, ys).mode("lines+markers+text").name(label);
            trace.text = Some(text);
            trace.textposition = Some("top center".to_string());
            trace
        })?;
        if let Some(axis) = fig.layout.xaxis.as_mut() {
            axis.rangeslider = Some(RangeSlider { visible: true });
            axis.showgrid = Some(false);
            axis.tickformat = Some("%b %Y".to_string());
        }
        if let Some(axis) = fig.layout.yaxis.as_mut() {
            axis.showgrid = Some(false);
        }
        Ok(fig)
    }

    pub fn plot_bar(&self, title: &str, x: &str, y: &str) -> Result<Figure, ChartError> {
        self.figure(title, x, y, |xs, ys, label| Trace::bar(xs, ys).name(label))
    }

    pub fn plot_scatter(&self, title: &str, x: &str, y: &str) -> Result<Figure, ChartError> {
        self.figure(title, x, y, |xs, ys, label| {
            Trace::scatter(xs, ys).mode("markers").name(label)
        })
    }

    /// Single-series chart with a summary box (latest value, YoY change,
    /// mean, median, min, max) and per-calendar-year low/high markers.
    ///
    /// Plots the `value` column when present, otherwise the first column.
    pub fn prepare_figure(frame: &TimeFrame, title: &str) -> Result<Figure, ChartError> {
        let frame = frame.sort_by_index();
        let values = match frame.column("value") {
            Ok(v) => v,
            Err(_) => frame.first_column()?.1,
        };
        let index = frame.index();
        let (Some(&last_ts), Some(&latest)) = (index.last(), values.last()) else {
            return Err(ChartError::NoData);
        };

        let yoy = pct_change(values, 12).last().copied().unwrap_or(f64::NAN);
        let (min_row, max_row) = extremes(values, 0..values.len()).ok_or(ChartError::NoData)?;

        let section_1 = format!(
            "Latest Refresh On: {}<br><b>{title}:</b> {}<br><b>YoY Change:</b> {} bps",
            last_ts.format("%a %b %d, %Y"),
            format_value(latest),
            format_value(yoy),
        );
        let section_2 = format!(
            "<b>Mean:</b> {}<br><b>Median:</b> {}<br><b>Min:</b> {} ({})<br><b>Max:</b> {} ({})",
            format_value(mean(&finite(values))),
            format_value(median(values)),
            format_value(values[min_row]),
            index[min_row].format("%b %Y"),
            format_value(values[max_row]),
            index[max_row].format("%b %Y"),
        );

        let mut fig = Figure::new();
        let xs: Vec<Value> = index.iter().map(|ts| timestamp_value(*ts)).collect();
        let mut line = Trace::scatter(xs, values.to_vec()).mode("lines").name(title);
        line.line = Some(Line {
            color: "darkblue".to_string(),
            width: 2.0,
        });
        line.hovertemplate = Some("Date: %{x}<br>Value: %{y:,.2f}".to_string());
        fig.add_trace(line);

        let mut years: BTreeMap<i32, std::ops::Range<usize>> = BTreeMap::new();
        for (row, ts) in index.iter().enumerate() {
            years
                .entry(ts.year())
                .and_modify(|r| r.end = row + 1)
                .or_insert(row..row + 1);
        }
        let last_year = years.keys().next_back().copied();
        for (year, rows) in &years {
            let Some((lo, hi)) = extremes(values, rows.clone()) else {
                continue;
            };
            for (row, kind, color) in [(lo, "Low", "red"), (hi, "High", "green")] {
                let mut marker = Trace::scatter(vec![timestamp_value(index[row])], vec![values[row]])
                    .mode("markers");
                if Some(*year) == last_year {
                    marker.name = Some(format!("Calendar Year {kind}"));
                }
                marker.marker = Some(Marker {
                    color: color.to_string(),
                });
                marker.showlegend = Some(false);
                fig.add_trace(marker);
                fig.add_annotation(year_marker(index[row], values[row], &format!("{year} {kind}"), color));
            }
        }

        let grid = Axis {
            showgrid: Some(true),
            gridcolor: Some("rgba(200, 200, 200, 0.2)".to_string()),
            ..Axis::default()
        };
        fig.layout.xaxis = Some(Axis {
            title: Some(Title::from("Date")),
            ..grid.clone()
        });
        fig.layout.yaxis = Some(Axis {
            title: Some(Title::from("Value")),
            ..grid
        });
        fig.layout.plot_bgcolor = Some("rgba(0, 0, 0, 0)".to_string());
        fig.layout.legend = Some(Legend {
            x: 0.5,
            y: -0.13,
            xanchor: "center".to_string(),
        });
        let anchor = index.get(1).copied().unwrap_or(last_ts);
        fig.add_annotation(Annotation {
            x: timestamp_value(anchor),
            y: 1.0,
            text: format!("{section_1}<br><br>{section_2}"),
            showarrow: false,
            xref: Some("x".to_string()),
            yref: Some("paper".to_string()),
            align: Some("left".to_string()),
            xanchor: Some("left".to_string()),
            font: Some(Font { color: None, size: 12 }),
            bgcolor: Some("rgba(255, 255, 255, 1)".to_string()),
            ..Annotation::default()
        });
        Ok(fig)
    }
}

fn year_marker(ts: NaiveDateTime, y: f64, text: &str, color: &str) -> Annotation {
    Annotation {
        x: timestamp_value(ts),
        y,
        text: text.to_string(),
        showarrow: true,
        align: Some("center".to_string()),
        font: Some(Font {
            color: Some("black".to_string()),
            size: 12,
        }),
        arrowhead: Some(2),
        arrowsize: Some(1.0),
        arrowwidth: Some(2.0),
        arrowcolor: Some("#636363".to_string()),
        ax: Some(20.0),
        ay: Some(-30.0),
        bordercolor: Some("#c7c7c7".to_string()),
        borderwidth: Some(2.0),
        borderpad: Some(4.0),
        bgcolor: Some(color.to_string()),
        opacity: Some(0.8),
        ..Annotation::default()
    }
}

/// Rows of the first minimum and first maximum in `rows`, skipping NaN.
fn extremes(values: &[f64], rows: std::ops::Range<usize>) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for row in rows.filter(|&r| !values[r].is_nan()) {
        best = Some(match best {
            None => (row, row),
            Some((lo, hi)) => (
                if values[row] < values[lo] { row } else { lo },
                if values[row] > values[hi] { row } else { hi },
            ),
        });
    }
    best
}

/// Dates at midnight render as `YYYY-MM-DD`, anything else with the time.
fn timestamp_value(ts: NaiveDateTime) -> Value {
    let text = if ts.num_seconds_from_midnight() == 0 {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    };
    Value::String(text)
}

/// The index when `name` is the index column, otherwise a value column.
fn axis_values(frame: &TimeFrame, name: &str) -> Result<Vec<Value>, ChartError> {
    if name == frame.index_name() {
        return Ok(frame.index().iter().map(|ts| timestamp_value(*ts)).collect());
    }
    Ok(frame.column(name)?.iter().map(|v| Value::from(*v)).collect())
}

/// Two decimals with thousands separators: `1234567.891` -> `1,234,567.89`.
pub fn format_value(value: f64) -> String {
    if !value.is_finite() {
        return "nan".to_string();
    }
    let fixed = format!("{:.2}", value.abs());
    let (int, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{frac}")
}
