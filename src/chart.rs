use crate::style::{self, Theme};

use data::chart::{LinePoint, PlotRange};
use data::{Config, OrderFlowChart, ProcessedState};
use serde::Serialize;

use std::path::{Path, PathBuf};

const FIGURE_HTML: &str = "orderflow-chart.html";
const PLOTLY_JS: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const FIGURE_HEIGHT: u32 = 780;
/// سهم پنل شاخص‌ها از ارتفاع نمودار
const METRICS_PANEL_SHARE: f64 = 0.1;
const WICK_WIDTH: f32 = 1.5;
const BODY_WIDTH: f32 = 6.0;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Chart(#[from] data::chart::Error),
    #[error("failed to encode figure")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write figure")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Open(#[from] data::InternalError),
}

/// نمودار به فرمت Plotly (داده‌ها و چیدمان)
#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trace {
    Scatter(Scatter),
    Heatmap(Heatmap),
}

impl Trace {
    pub fn name(&self) -> &str {
        match self {
            Trace::Scatter(s) => s.name,
            Trace::Heatmap(h) => h.name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Scatter {
    pub name: &'static str,
    pub x: Vec<String>,
    pub y: Vec<Option<f64>>,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textposition: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textfont: Option<Font>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<Line>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hoverinfo: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legendgroup: Option<&'static str>,
    pub showlegend: bool,
    pub connectgaps: bool,
    pub xaxis: &'static str,
    pub yaxis: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AxisValues {
    Numbers(Vec<f64>),
    Labels(Vec<String>),
}

#[derive(Debug, Clone, Serialize)]
pub struct Heatmap {
    pub name: &'static str,
    pub x: Vec<String>,
    pub y: AxisValues,
    pub z: Vec<Option<f64>>,
    pub zmin: f64,
    pub zmax: f64,
    pub text: Vec<String>,
    pub texttemplate: &'static str,
    pub textfont: Font,
    pub hovertemplate: &'static str,
    pub colorscale: Vec<(f32, String)>,
    pub showscale: bool,
    pub showlegend: bool,
    pub xgap: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ygap: Option<f32>,
    pub xaxis: &'static str,
    pub yaxis: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Line {
    pub color: String,
    pub width: f32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Font {
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    pub title: Title,
    pub height: u32,
    pub paper_bgcolor: String,
    pub plot_bgcolor: String,
    pub font: Font,
    pub dragmode: &'static str,
    pub margin: Margin,
    pub spikedistance: i32,
    pub hoverdistance: i32,
    pub xaxis: Axis,
    pub xaxis2: Axis,
    pub yaxis: Axis,
    pub yaxis2: Axis,
}

#[derive(Debug, Clone, Serialize)]
pub struct Title {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Margin {
    pub l: u32,
    pub r: u32,
    pub t: u32,
    pub b: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Axis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
    pub showgrid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showticklabels: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixedrange: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickformat: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickmode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickvals: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticktext: Option<Vec<String>>,
    pub showspikes: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spikecolor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spikesnap: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spikemode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spikethickness: Option<f32>,
}

/// تنظیمات تعامل کاربر با نمودار (ابزارهای رسم، زوم و جابجایی)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub scroll_zoom: bool,
    pub displaylogo: bool,
    pub mode_bar_buttons_to_remove: Vec<&'static str>,
    pub mode_bar_buttons_to_add: Vec<&'static str>,
}

impl Default for Interaction {
    fn default() -> Self {
        Self {
            scroll_zoom: true,
            displaylogo: false,
            mode_bar_buttons_to_remove: vec!["zoomIn", "zoomOut", "zoom", "autoScale"],
            mode_bar_buttons_to_add: vec![
                "drawline",
                "drawopenpath",
                "drawclosedpath",
                "drawcircle",
                "drawrect",
                "eraseshape",
            ],
        }
    }
}

impl Figure {
    /// ساخت نمودار از جداول پردازش‌شده و بازه نمایش
    pub fn new(state: &ProcessedState, range: &PlotRange, theme: &Theme) -> Self {
        let data = vec![
            volume_profile(state, theme),
            imbalance_heatmap(state, theme),
            candle_line(&state.up_wicks, theme.success, WICK_WIDTH, true),
            candle_line(&state.down_wicks, theme.danger, WICK_WIDTH, false),
            candle_line(&state.up_bodies, theme.success, BODY_WIDTH, false),
            candle_line(&state.down_bodies, theme.danger, BODY_WIDTH, false),
            metrics_heatmap(state, theme),
        ];

        Self {
            data,
            layout: layout(range, theme),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        std::fs::write(path, self.to_json()?)?;
        log::info!("Figure saved to {path:?}");
        Ok(())
    }

    /// صفحه HTML مستقل برای نمایش نمودار در مرورگر
    pub fn to_html(&self, interaction: &Interaction) -> Result<String, serde_json::Error> {
        let figure = self.to_json()?;
        let config = serde_json::to_string(interaction)?;

        Ok(format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{PLOTLY_JS}"></script>
<style>body {{ margin: 0; background: {background}; }}</style>
</head>
<body>
<div id="chart"></div>
<script>
const figure = {figure};
Plotly.newPlot("chart", figure.data, figure.layout, {config});
</script>
</body>
</html>
"#,
            title = self.layout.title.text,
            background = self.layout.paper_bgcolor,
        ))
    }
}

/// رسم نمودار: در حالت `show` صفحه HTML در پوشه داده نوشته و باز می‌شود،
/// در غیر این صورت خود نمودار برگردانده می‌شود
pub fn render(chart: &OrderFlowChart, config: &Config, show: bool) -> Result<Option<Figure>, Error> {
    let state = chart.processed()?;
    let range = chart.plot_range(config)?;

    log::info!("Total candles: {}", state.candles.len());

    let figure = Figure::new(state, &range, &Theme::default());
    log::debug!(
        "Chart layers: {}",
        figure.data.iter().map(Trace::name).collect::<Vec<_>>().join(", ")
    );

    if !show {
        return Ok(Some(figure));
    }

    let path = write_html(&figure)?;
    data::open_file(&path)?;

    Ok(None)
}

fn write_html(figure: &Figure) -> Result<PathBuf, Error> {
    let html = figure.to_html(&Interaction::default())?;
    Ok(data::write_to_file(&html, FIGURE_HTML)?)
}

fn volume_profile(state: &ProcessedState, theme: &Theme) -> Trace {
    let rows = &state.volume_profile;

    Trace::Scatter(Scatter {
        name: "VolumeProfile",
        x: rows.iter().map(|r| r.candle_id.to_string()).collect(),
        y: rows.iter().map(|r| Some(r.price.to_f64())).collect(),
        mode: "text",
        text: Some(rows.iter().map(|r| r.text.clone()).collect()),
        textposition: Some("middle right"),
        textfont: Some(Font {
            size: 8,
            family: None,
            color: Some(style::color_to_hex(style::darken(theme.text, 0.3))),
        }),
        line: None,
        hoverinfo: Some("none"),
        legendgroup: None,
        showlegend: true,
        connectgaps: false,
        xaxis: "x",
        yaxis: "y",
    })
}

fn imbalance_heatmap(state: &ProcessedState, theme: &Theme) -> Trace {
    let rows = &state.imbalance;

    Trace::Heatmap(Heatmap {
        name: "BidAsk",
        x: rows.iter().map(|r| r.candle_id.to_string()).collect(),
        y: AxisValues::Numbers(rows.iter().map(|r| r.price.to_f64()).collect()),
        z: rows.iter().map(|r| Some(r.size)).collect(),
        zmin: -1.0,
        zmax: 1.0,
        text: rows.iter().map(|r| r.text.clone()).collect(),
        texttemplate: "%{text}",
        textfont: Font {
            size: 11,
            family: Some("Courier New"),
            color: None,
        },
        hovertemplate: "Price: %{y}<br>Size: %{text}<br>Imbalance: %{z}<extra></extra>",
        colorscale: theme.imbalance_scale(),
        showscale: false,
        showlegend: true,
        xgap: 60.0,
        ygap: None,
        xaxis: "x",
        yaxis: "y",
    })
}

/// یک سری خط شکسته برای فتیله یا بدنه کندل‌ها (نقاط خالی خط را قطع می‌کنند)
fn candle_line(points: &[LinePoint], color: palette::Srgb, width: f32, showlegend: bool) -> Trace {
    Trace::Scatter(Scatter {
        name: "Candle",
        x: points.iter().map(|p| p.candle_id.to_string()).collect(),
        y: points.iter().map(|p| p.price.map(|price| price.to_f64())).collect(),
        mode: "lines",
        text: None,
        textposition: None,
        textfont: None,
        line: Some(Line {
            color: style::color_to_hex(color),
            width,
        }),
        hoverinfo: None,
        legendgroup: Some("candles"),
        showlegend,
        connectgaps: false,
        xaxis: "x",
        yaxis: "y",
    })
}

fn metrics_heatmap(state: &ProcessedState, theme: &Theme) -> Trace {
    let rows = &state.metrics;

    Trace::Heatmap(Heatmap {
        name: "Parameters",
        x: rows.iter().map(|r| r.candle_id.to_string()).collect(),
        y: AxisValues::Labels(rows.iter().map(|r| r.kind.to_string()).collect()),
        z: rows.iter().map(|r| r.value).collect(),
        zmin: -1.0,
        zmax: 1.0,
        text: rows.iter().map(|r| r.text.clone()).collect(),
        texttemplate: "%{text}",
        textfont: Font {
            size: 10,
            family: None,
            color: None,
        },
        hovertemplate: "%{x}<br>%{text}<extra></extra>",
        colorscale: theme.metrics_scale(),
        showscale: false,
        showlegend: true,
        xgap: 4.0,
        ygap: Some(4.0),
        xaxis: "x2",
        yaxis: "y2",
    })
}

fn layout(range: &PlotRange, theme: &Theme) -> Layout {
    let background = style::color_to_hex(theme.background);
    let spikes = Axis {
        showspikes: true,
        spikecolor: Some(style::color_to_hex(theme.text)),
        spikesnap: Some("cursor"),
        spikemode: Some("across"),
        spikethickness: Some(0.25),
        ..Axis::default()
    };

    let ticks = Axis {
        kind: Some("category"),
        tickmode: Some("array"),
        tickvals: Some(range.tick_vals.iter().map(ToString::to_string).collect()),
        ticktext: Some(range.tick_text.clone()),
        ..spikes.clone()
    };

    Layout {
        title: Title {
            text: "Order Book Chart".to_string(),
        },
        height: FIGURE_HEIGHT,
        paper_bgcolor: background.clone(),
        plot_bgcolor: background,
        font: Font {
            size: 12,
            family: None,
            color: Some(style::color_to_hex(theme.text)),
        },
        dragmode: "pan",
        margin: Margin {
            l: 10,
            r: 0,
            t: 40,
            b: 20,
        },
        spikedistance: 1000,
        hoverdistance: 100,
        xaxis: Axis {
            anchor: Some("y"),
            range: Some([range.x_start as f64, range.x_end as f64]),
            showticklabels: Some(false),
            ..ticks.clone()
        },
        xaxis2: Axis {
            title: Some(Title {
                text: "Time".to_string(),
            }),
            anchor: Some("y2"),
            matches: Some("x"),
            ..ticks
        },
        yaxis: Axis {
            title: Some(Title {
                text: "Price".to_string(),
            }),
            domain: Some([METRICS_PANEL_SHARE, 1.0]),
            anchor: Some("x"),
            range: Some([range.price_bottom.to_f64(), range.price_top.to_f64()]),
            tickformat: Some(".2f"),
            ..spikes.clone()
        },
        yaxis2: Axis {
            domain: Some([0.0, METRICS_PANEL_SHARE]),
            anchor: Some("x2"),
            fixedrange: Some(true),
            ..spikes
        },
    }
}
