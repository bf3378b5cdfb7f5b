//! Job metadata records (`.JB` files)
//!
//! The scheduler dumps one XML document per job. Only the tags listed in
//! [`JOB_TAGS`] are kept and the hierarchy is flattened: when a tag repeats,
//! the later element overwrites the earlier one.

use crate::error::{Result, StatError};
use crate::node_spec::{Machine, NodeSpec};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::trace;

/// Tags copied from a job record, in record order
pub const JOB_TAGS: &[&str] = &[
    "jobid",
    "queue",
    "Job_Name",
    "job_state",
    "Account_Name",
    "ctime",
    "mtime",
    "qtime",
    "etime",
    "Priority",
    "nodes",
    "nodect",
    "pmem",
    "walltime",
    "euser",
    "egroup",
    "submit_arg",
    "comp_time",
    "total_runtime",
];

/// Attributes of one job, as recorded by the scheduler
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobAttributes {
    /// e.g. `20704400.moab.tier2.leuven.vsc`
    pub jobid: Option<String>,
    pub queue: Option<String>,
    /// `#PBS -N`
    pub job_name: Option<String>,
    pub job_state: Option<String>,
    /// `#PBS -A`
    pub account_name: Option<String>,
    pub ctime: Option<String>,
    pub mtime: Option<String>,
    pub qtime: Option<String>,
    pub etime: Option<String>,
    pub priority: Option<String>,
    /// Raw node spec, `#PBS -l nodes=...`
    pub nodes: Option<String>,
    pub nodect: Option<String>,
    pub pmem: Option<String>,
    pub walltime: Option<String>,
    pub euser: Option<String>,
    pub egroup: Option<String>,
    pub submit_arg: Option<String>,
    pub comp_time: Option<String>,
    pub total_runtime: Option<String>,

    cores_per_node: u32,
    machine: Option<Machine>,
}

impl JobAttributes {
    /// Load a job record from disk
    ///
    /// Fails with `NotFound` before any parsing if the file is missing. The
    /// character encoding is taken from the XML declaration (UTF-8 when
    /// absent). A record that cannot be read is a `Record` error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StatError::not_found(path));
        }
        let bytes = fs::read(path).map_err(|err| StatError::Record {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_bytes(&bytes, path)
    }

    /// Parse a job record from raw bytes, honoring the declared encoding
    pub fn from_bytes(bytes: &[u8], origin: &Path) -> Result<Self> {
        Self::from_reader(Reader::from_reader(bytes), origin)
    }

    /// Parse a job record from XML text; `origin` is only used in errors
    pub fn from_xml(content: &str, origin: &Path) -> Result<Self> {
        Self::from_reader(Reader::from_str(content), origin)
    }

    fn from_reader(reader: Reader<&[u8]>, origin: &Path) -> Result<Self> {
        let tags = collect_tags(reader).map_err(|message| StatError::Record {
            path: origin.to_path_buf(),
            message,
        })?;
        Self::from_tags(tags)
    }

    /// Build attributes from flattened `(tag, text)` pairs, in document order
    ///
    /// Tags outside [`JOB_TAGS`] are ignored; repeats overwrite. The derived
    /// fields are then decoded from `nodes`.
    pub fn from_tags<I, S>(tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Option<String>)>,
        S: AsRef<str>,
    {
        let mut attrs = Self::default();
        for (tag, text) in tags {
            if let Some(slot) = attrs.slot(tag.as_ref()) {
                *slot = text;
            }
        }
        let spec = NodeSpec::decode(attrs.nodes.as_deref())?;
        attrs.cores_per_node = spec.cores_per_node;
        attrs.machine = spec.machine;
        Ok(attrs)
    }

    fn slot(&mut self, tag: &str) -> Option<&mut Option<String>> {
        let slot = match tag {
            "jobid" => &mut self.jobid,
            "queue" => &mut self.queue,
            "Job_Name" => &mut self.job_name,
            "job_state" => &mut self.job_state,
            "Account_Name" => &mut self.account_name,
            "ctime" => &mut self.ctime,
            "mtime" => &mut self.mtime,
            "qtime" => &mut self.qtime,
            "etime" => &mut self.etime,
            "Priority" => &mut self.priority,
            "nodes" => &mut self.nodes,
            "nodect" => &mut self.nodect,
            "pmem" => &mut self.pmem,
            "walltime" => &mut self.walltime,
            "euser" => &mut self.euser,
            "egroup" => &mut self.egroup,
            "submit_arg" => &mut self.submit_arg,
            "comp_time" => &mut self.comp_time,
            "total_runtime" => &mut self.total_runtime,
            _ => return None,
        };
        Some(slot)
    }

    /// Cores requested per node (`ppn`), 1 when unspecified
    pub fn cores_per_node(&self) -> u32 {
        self.cores_per_node
    }

    /// Hardware class requested, if any
    pub fn machine(&self) -> Option<Machine> {
        self.machine
    }

    /// `nodect × ppn`, when the node count is recorded
    pub fn total_cores(&self) -> Option<u32> {
        let nodes: u32 = self.nodect.as_deref()?.trim().parse().ok()?;
        nodes.checked_mul(self.cores_per_node)
    }
}

struct Frame {
    name: String,
    text: Option<String>,
    has_child: bool,
}

/// Flatten an XML document into `(tag, text)` pairs for allow-listed tags.
///
/// The text of an element is the character data before its first child. A
/// document that ends with elements still open is rejected.
fn collect_tags(mut reader: Reader<&[u8]>) -> std::result::Result<Vec<(String, Option<String>)>, String> {
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut tags = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {}", reader.error_position(), e))?;
        match event {
            Event::Start(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent.has_child = true;
                }
                stack.push(Frame {
                    name: decode(&reader, e.name().as_ref())?,
                    text: None,
                    has_child: false,
                });
            }
            Event::Empty(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent.has_child = true;
                }
                let name = decode(&reader, e.name().as_ref())?;
                if JOB_TAGS.contains(&name.as_str()) {
                    tags.push((name, None));
                }
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(|e| e.to_string())?;
                append_text(&mut stack, &text);
            }
            Event::CData(e) => {
                let text = decode(&reader, &e.into_inner())?;
                append_text(&mut stack, &text);
            }
            Event::End(_) => {
                if let Some(frame) = stack.pop() {
                    if JOB_TAGS.contains(&frame.name.as_str()) {
                        trace!(tag = %frame.name, "job record tag");
                        tags.push((frame.name, frame.text));
                    }
                }
            }
            Event::Eof => {
                if let Some(frame) = stack.last() {
                    return Err(format!("unclosed element <{}>", frame.name));
                }
                break;
            }
            _ => {}
        }
    }

    Ok(tags)
}

fn decode(reader: &Reader<&[u8]>, raw: &[u8]) -> std::result::Result<String, String> {
    reader
        .decoder()
        .decode(raw)
        .map(|text| text.into_owned())
        .map_err(|e| e.to_string())
}

fn append_text(stack: &mut [Frame], text: &str) {
    if let Some(frame) = stack.last_mut() {
        if !frame.has_child {
            frame.text.get_or_insert_with(String::new).push_str(text);
        }
    }
}
