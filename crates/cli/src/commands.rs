//! Subcommand implementations.

use std::fs::{self, File};
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};
use trellis_serde::{Format, NodeKind, NodeTree, TreeSettings, parse_json, parse_xml};

use crate::config::{FmtArgs, InputArgs, PathsArgs};

/// One line of `trellis paths` output.
#[derive(Debug, Serialize)]
struct PathRecord {
    path: String,
    kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

fn load(input: &InputArgs, settings: TreeSettings) -> Result<NodeTree> {
    let format = input
        .resolve_format()
        .with_context(|| format!("cannot infer the format of {}", input.input.display()))?;
    let bytes = fs::read(&input.input)
        .with_context(|| format!("failed to read {}", input.input.display()))?;
    debug!(path = %input.input.display(), %format, bytes = bytes.len(), "Parsing document");

    let tree = match format {
        Format::Xml => parse_xml(&bytes, settings),
        Format::Json => parse_json(&bytes, settings),
    }
    .with_context(|| format!("failed to parse {}", input.input.display()))?;
    Ok(tree)
}

/// Re-encodes the input document to `--output`, or to `stdout`.
pub fn fmt<W: Write>(args: &FmtArgs, stdout: W) -> Result<()> {
    let tree = load(&args.input, args.settings())?;
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            tree.encode(BufWriter::new(file))?;
            info!(path = %path.display(), nodes = tree.len(), "Wrote document");
        }
        None => {
            let mut stdout = stdout;
            tree.encode(&mut stdout)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

/// Writes one line per node in document order.
pub fn paths<W: Write>(args: &PathsArgs, mut out: W) -> Result<()> {
    let tree = load(&args.input, TreeSettings::default())?;
    for id in tree.descendants() {
        let node = tree.node(id);
        let record = PathRecord {
            path: node.path(),
            kind: node.kind(),
            value: node
                .value()
                .filter(|_| node.kind() == NodeKind::Value)
                .map(|value| value.as_text().into_owned()),
        };
        if args.json {
            serde_json::to_writer(&mut out, &record)?;
            writeln!(out)?;
        } else {
            writeln!(
                out,
                "{}\t{}\t{}",
                record.path,
                record.kind,
                record.value.unwrap_or_default()
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::FormatArg;

    fn input(path: &Path, format: Option<FormatArg>) -> InputArgs {
        InputArgs {
            input: path.to_path_buf(),
            format,
        }
    }

    fn fmt_args(path: &Path) -> FmtArgs {
        FmtArgs {
            input: input(path, None),
            pretty: false,
            omit_declaration: false,
            default_namespace: None,
            output: None,
        }
    }

    #[test]
    fn test_fmt_pretty_xml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("order.xml");
        fs::write(&path, "<Order>\n<Total>9.50</Total>   </Order>").unwrap();

        let args = FmtArgs {
            pretty: true,
            omit_declaration: true,
            ..fmt_args(&path)
        };
        let mut out = Vec::new();
        fmt(&args, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<Order>\n  <Total>9.50</Total>\n</Order>\n"
        );
    }

    #[test]
    fn test_fmt_json_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let target = dir.path().join("out.json");
        fs::write(&path, r#"{ "b": 1.50, "a": [true, null] }"#).unwrap();

        let args = FmtArgs {
            output: Some(target.clone()),
            ..fmt_args(&path)
        };
        let mut out = Vec::new();
        fmt(&args, &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            r#"{"b":1.50,"a":[true,null]}"#
        );
    }

    #[test]
    fn test_fmt_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xml");
        fs::write(&path, "<a><b></a>").unwrap();

        let err = fmt(&fmt_args(&path), Vec::<u8>::new()).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_paths_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.xml");
        fs::write(&path, r#"<a x="1"><b>t</b></a>"#).unwrap();

        let args = PathsArgs {
            input: input(&path, None),
            json: false,
        };
        let mut out = Vec::new();
        paths(&args, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["/a\tobject\t", "/a/@x\tvalue\t1", "/a/b\tvalue\tt"]);
    }

    #[test]
    fn test_paths_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.data");
        fs::write(&path, r#"{"flags":[true,"x"]}"#).unwrap();

        let args = PathsArgs {
            input: input(&path, Some(FormatArg::Json)),
            json: true,
        };
        let mut out = Vec::new();
        paths(&args, &mut out).unwrap();
        let records: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(
            records,
            vec![
                serde_json::json!({"path": "$", "kind": "object"}),
                serde_json::json!({"path": "$.flags", "kind": "array"}),
                serde_json::json!({"path": "$.flags[0]", "kind": "value", "value": "true"}),
                serde_json::json!({"path": "$.flags[1]", "kind": "value", "value": "x"}),
            ]
        );
    }
}
