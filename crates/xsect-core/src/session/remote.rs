use super::{
    CommandRequest, CommandTransport, CrossSectionHandle, ModelController, PlotHandle,
    ResultReader, SessionError, SessionResult,
};
use crate::domain::{CrossSectionLine, PhaseInfo, ResultKind};
use serde_json::{Value, json};
use std::path::Path;

/// Input-server session.
pub struct RemoteController<T> {
    transport: T,
}

impl<T: CommandTransport> RemoteController<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn call(&mut self, command: &str, arguments: Vec<Value>) -> SessionResult<Value> {
        self.transport.call(&CommandRequest::global(command, arguments))
    }
}

impl<T: CommandTransport> ModelController for RemoteController<T> {
    fn open(&mut self, model: &Path) -> SessionResult<()> {
        self.call("open", vec![json!(model.to_string_lossy())])
            .map(drop)
    }

    fn go_to_stages(&mut self) -> SessionResult<()> {
        self.call("gotostages", Vec::new()).map(drop)
    }

    fn view_first_phase(&mut self) -> SessionResult<()> {
        let returned = self.call("phases", Vec::new())?;
        let phases = parse_phases("phases", returned)?;
        let first = phases.first().ok_or_else(|| SessionError::CommandFailed {
            command: "view".to_string(),
            message: "model defines no phases".to_string(),
        })?;
        self.call("view", vec![json!(first.id)]).map(drop)
    }
}

/// Output-server session.
pub struct RemoteReader<T> {
    transport: T,
}

impl<T: CommandTransport> RemoteReader<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn call(&mut self, command: &str, arguments: Vec<Value>) -> SessionResult<Value> {
        self.transport.call(&CommandRequest::global(command, arguments))
    }
}

impl<T: CommandTransport> ResultReader for RemoteReader<T> {
    fn phases(&mut self) -> SessionResult<Vec<PhaseInfo>> {
        let returned = self.call("phases", Vec::new())?;
        parse_phases("phases", returned)
    }

    fn active_plot(&mut self) -> SessionResult<PlotHandle> {
        let returned = self.call("plots", Vec::new())?;
        let Value::Array(plots) = returned else {
            return Err(malformed("plots", "expected an array of plot references"));
        };
        let last = plots
            .into_iter()
            .last()
            .ok_or_else(|| malformed("plots", "output server reported no plots"))?;
        object_reference("plots", last).map(PlotHandle)
    }

    fn line_cross_section(
        &mut self,
        plot: &PlotHandle,
        line: &CrossSectionLine,
    ) -> SessionResult<CrossSectionHandle> {
        let returned = self.call(
            "linecrosssectionplot",
            vec![
                json!(plot.0),
                json!([line.start.x, line.start.y]),
                json!([line.end.x, line.end.y]),
            ],
        )?;
        object_reference("linecrosssectionplot", returned).map(CrossSectionHandle)
    }

    fn cross_section_results(
        &mut self,
        cross_section: &CrossSectionHandle,
        phase: &PhaseInfo,
        kind: ResultKind,
    ) -> SessionResult<Vec<f64>> {
        let command = "getcrosssectionresults";
        let returned = self.call(
            command,
            vec![
                json!(cross_section.0),
                json!(phase.id),
                json!(kind.remote_name()),
            ],
        )?;
        let Value::Array(values) = returned else {
            return Err(malformed(command, "expected an array of numbers"));
        };
        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                value.as_f64().ok_or_else(|| {
                    malformed(
                        command,
                        format!("{kind} value {index} is not a number: {value}"),
                    )
                })
            })
            .collect()
    }
}

fn malformed(command: &str, message: impl Into<String>) -> SessionError {
    SessionError::MalformedReply {
        command: command.to_string(),
        message: message.into(),
    }
}

/// Accepts either a bare id string or an object carrying an `id` field.
fn object_reference(command: &str, value: Value) -> SessionResult<String> {
    match value {
        Value::String(id) => Ok(id),
        Value::Object(mut fields) => match fields.remove("id") {
            Some(Value::String(id)) => Ok(id),
            _ => Err(malformed(command, "object reference without a string 'id'")),
        },
        other => Err(malformed(
            command,
            format!("expected an object reference, got {other}"),
        )),
    }
}

fn parse_phases(command: &str, value: Value) -> SessionResult<Vec<PhaseInfo>> {
    let Value::Array(entries) = value else {
        return Err(malformed(command, "expected an array of phases"));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(ordinal, entry)| {
            let identification = entry
                .get("identification")
                .and_then(Value::as_str)
                .map(str::to_string);
            let id = object_reference(command, entry)?;
            Ok(PhaseInfo::new(id, ordinal, identification))
        })
        .collect()
}
