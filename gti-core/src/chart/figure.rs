//! Plotly-compatible figure documents.
//!
//! A [`Figure`] serializes to the `{data, layout}` JSON that plotly.js
//! renders, so it can be written as JSON for another tool or as a standalone
//! HTML page.

use super::ChartError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Scatter,
    Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: TraceKind,
    pub x: Vec<Value>,
    #[serde(deserialize_with = "nullable_floats")]
    pub y: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textposition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<Line>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showlegend: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hovertemplate: Option<String>,
}

impl Trace {
    fn new(kind: TraceKind, x: Vec<Value>, y: Vec<f64>) -> Self {
        Self {
            kind,
            x,
            y,
            mode: None,
            name: None,
            text: None,
            textposition: None,
            line: None,
            marker: None,
            showlegend: None,
            hovertemplate: None,
        }
    }

    pub fn scatter(x: Vec<Value>, y: Vec<f64>) -> Self {
        Self::new(TraceKind::Scatter, x, y)
    }

    pub fn bar(x: Vec<Value>, y: Vec<f64>) -> Self {
        Self::new(TraceKind::Bar, x, y)
    }

    pub fn mode(mut self, mode: &str) -> Self {
        self.mode = Some(mode.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub color: String,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Title {
    pub text: String,
}

impl From<&str> for Title {
    fn from(text: &str) -> Self {
        Self { text: text.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSlider {
    pub visible: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showgrid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gridcolor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickformat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rangeslider: Option<RangeSlider>,
}

impl Axis {
    pub fn titled(title: &str) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legend {
    pub x: f64,
    pub y: f64,
    pub xanchor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Font {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub size: u32,
}

/// Text placed on the plot, optionally with an arrow to `(x, y)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub x: Value,
    pub y: f64,
    pub text: String,
    pub showarrow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xanchor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrowhead: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrowsize: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrowwidth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrowcolor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ax: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bordercolor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borderwidth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borderpad: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgcolor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot_bgcolor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<Legend>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

impl Figure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_trace(&mut self, trace: Trace) -> &mut Self {
        self.data.push(trace);
        self
    }

    pub fn add_annotation(&mut self, annotation: Annotation) -> &mut Self {
        self.layout.annotations.push(annotation);
        self
    }

    pub fn to_json(&self) -> Result<String, ChartError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// A self-contained page that loads plotly.js from its CDN.
    pub fn to_html(&self) -> Result<String, ChartError> {
        // "</" inside the inline script would end it early.
        let json = serde_json::to_string(self)?.replace("</", "<\\/");
        let title = self
            .layout
            .title
            .as_ref()
            .map(|t| escape_html(&t.text))
            .unwrap_or_else(|| "chart".to_string());
        Ok(format!(
            "<!DOCTYPE html>\n\
<html>\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<title>{title}</title>\n\
<script src=\"{PLOTLY_CDN}\"></script>\n\
</head>\n\
<body>\n\
<div id=\"chart\" style=\"width:100%;height:90vh;\"></div>\n\
<script>\n\
var figure = {json};\n\
Plotly.newPlot(\"chart\", figure.data, figure.layout);\n\
</script>\n\
</body>\n\
</html>\n"
        ))
    }

    pub fn write_json(&self, path: &Path) -> Result<(), ChartError> {
        write(path, self.to_json()?)
    }

    pub fn write_html(&self, path: &Path) -> Result<(), ChartError> {
        write(path, self.to_html()?)
    }
}

fn write(path: &Path, content: String) -> Result<(), ChartError> {
    std::fs::write(path, content).map_err(|source| ChartError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// NaN is written as `null`; read it back the same way.
fn nullable_floats<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<f64>, D::Error> {
    let raw: Vec<Option<f64>> = Vec::deserialize(de)?;
    Ok(raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
