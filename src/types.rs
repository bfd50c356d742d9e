// src/types.rs
use std::sync::mpsc::Sender;

use serde_json::Value;

use crate::widgets::PlotFrame;

// Caller -> frequency plot worker
#[derive(Clone, Debug)]
pub enum FreqPlotCommand {
    SetTitle(String),
    SetDisplayRate(f64),
    SetSampleRate(f64),
    SetNumFftBins(usize),
    SetupCurves,
}

// Caller -> time plot worker
#[derive(Clone, Debug)]
pub enum TimePlotCommand {
    SetTitle(String),
    SetDisplayRate(f64),
    SetSampleRate(f64),
    // Blocking initial setup, before any data arrives
    SetupCurves,
}

// Caller -> drop down worker
#[derive(Clone, Debug)]
pub enum DropDownCommand {
    SetTitle(String),
    SetValue(Value),
    SetOptions(Vec<Value>),
}

// Worker -> render layer. All fire-and-forget.
#[derive(Clone, Debug, PartialEq)]
pub enum PlotEvent {
    Replot(PlotFrame),
    InstallLegend,
    TitleChanged(String),
    ValueChanged(Value),
}

#[derive(Clone, Debug, PartialEq)]
pub struct WidgetEvent {
    pub widget: String,
    pub event: PlotEvent,
}

/// Sending half of the render channel, tagged with the emitting widget.
#[derive(Clone, Debug)]
pub struct EventSink {
    widget: String,
    tx: Sender<WidgetEvent>,
}

impl EventSink {
    pub fn new(widget: impl Into<String>, tx: Sender<WidgetEvent>) -> Self {
        Self {
            widget: widget.into(),
            tx,
        }
    }

    pub fn widget(&self) -> &str {
        &self.widget
    }

    /// Never waits on the receiver; a closed render layer is ignored.
    pub fn emit(&self, event: PlotEvent) {
        self.tx
            .send(WidgetEvent {
                widget: self.widget.clone(),
                event,
            })
            .ok();
    }
}
