use std::time::Instant;

use log::debug;
use serde_json::Value;

use crate::config::DropDownConfig;
use crate::dsp::{InputPorts, PlotError};
use crate::engine::Block;
use crate::types::{DropDownCommand, EventSink, PlotEvent};

#[derive(Clone, Debug, PartialEq)]
pub struct SelectorOption {
    pub label: String,
    pub value: Value,
}

/// Validates `[[label, value], ...]`. Nothing is returned unless every entry is valid.
pub fn parse_options(options: &[Value]) -> Result<Vec<SelectorOption>, PlotError> {
    options
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let pair = entry.as_array().ok_or_else(|| {
                PlotError::InvalidOptionFormat(format!("entry {i} is not a list"))
            })?;
            if pair.len() != 2 {
                return Err(PlotError::InvalidOptionFormat(format!(
                    "entry {i} must be a list of size 2, got {}",
                    pair.len()
                )));
            }
            let label = pair[0].as_str().ok_or_else(|| {
                PlotError::InvalidOptionFormat(format!("entry {i}[0] must be a string"))
            })?;
            Ok(SelectorOption {
                label: label.to_string(),
                value: pair[1].clone(),
            })
        })
        .collect()
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Selector over a list of labelled values.
pub struct DropDown {
    title: String,
    options: Vec<SelectorOption>,
    selected: Option<usize>,
    events: EventSink,
}

impl DropDown {
    pub fn new(events: EventSink) -> Self {
        Self {
            title: String::new(),
            options: Vec::new(),
            selected: None,
            events,
        }
    }

    pub fn from_config(config: &DropDownConfig, events: EventSink) -> Result<Self, PlotError> {
        let mut drop_down = Self::new(events);
        drop_down.set_title(config.title.clone());
        drop_down.set_options(&config.options)?;
        drop_down.set_value(&config.value);
        Ok(drop_down)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn label_markup(&self) -> String {
        format!("<b>{}</b>", escape_html(&self.title))
    }

    pub fn set_title(&mut self, title: String) {
        self.title = title;
        self.events.emit(PlotEvent::TitleChanged(self.label_markup()));
    }

    pub fn options(&self) -> &[SelectorOption] {
        &self.options
    }

    /// Current selection, or `Null` with nothing selected.
    pub fn value(&self) -> Value {
        self.selected
            .and_then(|i| self.options.get(i))
            .map(|option| option.value.clone())
            .unwrap_or(Value::Null)
    }

    /// Replaces the option list, keeping the previous value selected when it
    /// is still offered and falling back to the first option otherwise.
    pub fn set_options(&mut self, options: &[Value]) -> Result<(), PlotError> {
        let parsed = parse_options(options)?;
        let old = self.value();
        self.options = parsed;
        self.selected = if self.options.is_empty() { None } else { Some(0) };
        self.select(&old);
        if self.value() != old {
            self.emit_value();
        }
        Ok(())
    }

    /// Returns false (and changes nothing) when no option carries `value`.
    pub fn set_value(&mut self, value: &Value) -> bool {
        let old = self.value();
        if !self.select(value) {
            debug!("{}: {value} is not an option", self.events.widget());
            return false;
        }
        if self.value() != old {
            self.emit_value();
        }
        true
    }

    fn select(&mut self, value: &Value) -> bool {
        match self.options.iter().rposition(|option| &option.value == value) {
            Some(index) => {
                self.selected = Some(index);
                true
            }
            None => false,
        }
    }

    fn emit_value(&self) {
        self.events.emit(PlotEvent::ValueChanged(self.value()));
    }
}

impl Block for DropDown {
    type Command = DropDownCommand;

    fn activate(&mut self, _ports: &mut InputPorts) -> Result<(), PlotError> {
        self.emit_value();
        Ok(())
    }

    fn apply(&mut self, _ports: &mut InputPorts, command: DropDownCommand) -> Result<(), PlotError> {
        match command {
            DropDownCommand::SetTitle(title) => self.set_title(title),
            DropDownCommand::SetValue(value) => {
                self.set_value(&value);
            }
            DropDownCommand::SetOptions(options) => self.set_options(&options)?,
        }
        Ok(())
    }

    fn work(&mut self, _ports: &mut InputPorts, _now: Instant) -> Result<(), PlotError> {
        Ok(())
    }
}
