/* The cuts catalog: the input side of the selection problem.

A catalog is an ordered list of nodes, each carrying its candidate cuts in
the order the enumerator produced them. That positional order is load-bearing:
the index written to the chosen-cuts JSON is the index into the *original*
cuts array, so nothing here may reorder or drop entries.
*/

use crate::Error;

use rustc_hash::FxHashSet;
use serde::Deserialize;

use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub nodes: Vec<Node>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub cuts: Vec<Cut>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cut {
    pub leaves: Vec<String>,
    pub inv_cost: u64,
    pub area_cost: u64,
    pub depth_cost: u64,
}

impl Cut {
    /// A cut whose sole leaf is the owning node. Structurally degenerate,
    /// never selectable.
    pub fn is_self_cut(&self, owner: &str) -> bool {
        self.leaves.len() == 1 && self.leaves[0] == owner
    }
}

// Raw serde form of the catalog; `Catalog::from_raw` lifts it to the
// canonical representation above.

#[derive(Deserialize)]
struct RawCatalog {
    nodes: Vec<RawNode>,
    #[serde(default)]
    outputs: Vec<String>,
    #[serde(default)]
    inputs: Vec<String>,
}

#[derive(Deserialize)]
struct RawNode {
    name: String,
    #[serde(default)]
    cuts: Vec<RawCut>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCut {
    // A bare list of leaves, costs defaulted.
    Bare(Vec<String>),
    Record {
        leaves: Vec<String>,
        #[serde(default)]
        inv_cost: Option<u64>,
        #[serde(default)]
        area_cost: Option<u64>,
        #[serde(default)]
        depth_cost: Option<u64>,
    },
}

impl RawCut {
    fn lift(self) -> Cut {
        match self {
            RawCut::Bare(leaves) => Cut {
                inv_cost: 0,
                area_cost: leaves.len() as u64,
                depth_cost: 1,
                leaves,
            },
            RawCut::Record {
                leaves,
                inv_cost,
                area_cost,
                depth_cost,
            } => Cut {
                inv_cost: inv_cost.unwrap_or(0),
                area_cost: area_cost.unwrap_or(leaves.len() as u64),
                // A zero step would let a path grow without growing the
                // depth objective; clamp like the enumerator's consumers do.
                depth_cost: depth_cost.unwrap_or(1).max(1),
                leaves,
            },
        }
    }
}

impl Catalog {
    /// Load a catalog. A `.json` path is parsed directly; anything else is
    /// handed to the external cut enumerator first (see `enumerate_cuts`).
    pub fn load(
        path: &Path,
        enum_bin: Option<&str>,
        cut_size: Option<u32>,
    ) -> Result<Catalog, Error> {
        let is_json = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Catalog::from_json_file(path)
        } else {
            let tmp = enumerate_cuts(path, enum_bin, cut_size)?;
            Catalog::from_json_file(tmp.path())
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Catalog, Error> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::BadCatalog {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        contents.parse()
    }

    fn from_raw(raw: RawCatalog) -> Result<Catalog, Error> {
        let mut seen = FxHashSet::default();
        for nd in &raw.nodes {
            if !seen.insert(nd.name.as_str()) {
                return Err(Error::BadCatalog {
                    reason: format!("duplicate node name `{}`", nd.name),
                });
            }
        }
        for out in &raw.outputs {
            if !seen.contains(out.as_str()) {
                return Err(Error::BadCatalog {
                    reason: format!("output `{out}` does not name a catalog node"),
                });
            }
        }

        let nodes = raw
            .nodes
            .into_iter()
            .map(|nd| Node {
                name: nd.name,
                cuts: nd.cuts.into_iter().map(RawCut::lift).collect(),
            })
            .collect();

        Ok(Catalog {
            nodes,
            inputs: raw.inputs,
            outputs: raw.outputs,
        })
    }

    /// The root set: declared outputs, else `Nout` if present, else the last
    /// node of the catalog.
    pub fn roots(&self) -> Vec<&str> {
        if !self.outputs.is_empty() {
            return self.outputs.iter().map(String::as_str).collect();
        }
        if self.nodes.iter().any(|n| n.name == "Nout") {
            return vec!["Nout"];
        }
        match self.nodes.last() {
            Some(last) => vec![last.name.as_str()],
            None => vec![],
        }
    }
}

impl FromStr for Catalog {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: RawCatalog = serde_json::from_str(s).map_err(|e| Error::BadCatalog {
            reason: e.to_string(),
        })?;
        Catalog::from_raw(raw)
    }
}

/// Run the external cut enumerator on a non-JSON input (typically BLIF) and
/// return the temp file holding the generated cuts JSON.
fn enumerate_cuts(
    input: &Path,
    hint: Option<&str>,
    cut_size: Option<u32>,
) -> Result<tempfile::NamedTempFile, Error> {
    let bin = resolve_enumerator(hint, input);
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cuts".to_string());
    let tmp = tempfile::Builder::new()
        .prefix(&format!("{stem}_cuts_"))
        .suffix(".json")
        .tempfile()
        .map_err(|e| Error::ExternalTool(format!("cannot create temp file: {e}")))?;

    let mut cmd = Command::new(&bin);
    cmd.arg(input).arg(tmp.path());
    if let Some(k) = cut_size {
        cmd.arg(k.to_string());
    }

    log::info!(
        "converting {} to cuts JSON via {} (output: {})",
        input.display(),
        bin.display(),
        tmp.path().display()
    );
    let status = cmd
        .status()
        .map_err(|e| Error::ExternalTool(format!("cannot launch {}: {e}", bin.display())))?;
    if !status.success() {
        return Err(Error::ExternalTool(format!(
            "{} exited with {status} on {}",
            bin.display(),
            input.display()
        )));
    }
    Ok(tmp)
}

/// Resolution order: explicit hint (a file path, or a command name left to
/// the OS to find), then `cut_enumeration` next to the input file, then a
/// bare `cut_enumeration` resolved through PATH.
fn resolve_enumerator(hint: Option<&str>, input: &Path) -> PathBuf {
    if let Some(hint) = hint {
        return PathBuf::from(hint);
    }
    let sibling = input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("cut_enumeration");
    if sibling.is_file() {
        return sibling;
    }
    PathBuf::from("cut_enumeration")
}
