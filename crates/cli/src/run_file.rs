//! JSON run files.

use std::path::Path;

use anyhow::Context;
use hostrun::protocol::{Settings, TestElement};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFile {
	#[serde(default)]
	pub run_id: Option<String>,
	#[serde(default)]
	pub settings: Settings,
	#[serde(default)]
	pub tests: Vec<RunFileTest>,
}

/// A test entry; `id` defaults to the name.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFileTest {
	#[serde(default)]
	pub id: Option<String>,
	pub name: String,
	#[serde(default)]
	pub settings: Settings,
}

impl RunFileTest {
	pub fn into_element(self) -> TestElement {
		let id = self.id.unwrap_or_else(|| self.name.clone());
		TestElement {
			settings: self.settings,
			..TestElement::new(id, self.name)
		}
	}
}

pub fn load(path: &Path) -> anyhow::Result<RunFile> {
	let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read run file {}", path.display()))?;
	serde_json::from_str(&raw).with_context(|| format!("failed to parse run file {}", path.display()))
}
