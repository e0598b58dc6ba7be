//! Plan document loading.
//!
//! Plans are produced by an external planning step and handed over as JSON
//! or YAML documents, either as files or as strings.

use std::path::Path;
use tracing::{debug, info};

use crate::error::{PlanError, Result};

use super::spec::Plan;

/// Document formats a plan can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    /// JSON document.
    Json,
    /// YAML document.
    Yaml,
}

/// Parser for plan documents.
#[derive(Debug, Default)]
pub struct PlanParser;

impl PlanParser {
    /// Creates a new plan parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads a plan from a file. The format follows the file extension,
    /// falling back to content sniffing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Plan> {
        let path = path.as_ref();
        info!("Loading plan from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            PlanError::parse(
                format!("Failed to read file: {e}"),
                Some(path.display().to_string()),
            )
        })?;

        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => PlanFormat::Json,
            Some("yaml" | "yml") => PlanFormat::Yaml,
            _ => Self::detect_format(&content),
        };

        self.parse_as(&content, format, Some(path))
    }

    /// Parses a plan, detecting the format from its content.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is invalid.
    pub fn parse(&self, content: &str) -> Result<Plan> {
        self.parse_as(content, Self::detect_format(content), None)
    }

    /// Parses a plan in an explicit format.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is invalid.
    pub fn parse_as(&self, content: &str, format: PlanFormat, source: Option<&Path>) -> Result<Plan> {
        debug!("Parsing {format:?} plan");
        let location = || source.map(|p| p.display().to_string());

        let plan: Plan = match format {
            PlanFormat::Json => serde_json::from_str(content)
                .map_err(|e| PlanError::parse(format!("JSON parse error: {e}"), location()))?,
            PlanFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| PlanError::parse(format!("YAML parse error: {e}"), location()))?,
        };

        debug!("Parsed plan with {} steps", plan.step_count());
        Ok(plan)
    }

    /// Guesses the format: a document starting with `{` is JSON.
    #[must_use]
    pub fn detect_format(content: &str) -> PlanFormat {
        if content.trim_start().starts_with('{') {
            PlanFormat::Json
        } else {
            PlanFormat::Yaml
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CloudPilotError;
    use crate::plan::ParamValue;
    use std::io::Write;

    const YAML_PLAN: &str = r#"
explanation: Web server with an attached bucket
deploymentOrder: [web, assets]
steps:
  web:
    service: ec2
    operation: run_instances
    parameters:
      ImageId: ami-123
      InstanceType: t3.micro
      MinCount: 1
      MaxCount: 1
    rollback:
      operation: terminate_instances
      parameters:
        InstanceIds: ["${web.Instances.0.InstanceId}"]
    costFactors:
      service: ec2
      instance_type: t3.micro
  assets:
    service: s3
    operation: create_bucket
    parameters:
      Bucket: web-assets
"#;

    #[test]
    fn test_parse_yaml_plan() {
        let plan = PlanParser::new().parse(YAML_PLAN).expect("parse");
        assert_eq!(plan.deployment_order, vec!["web", "assets"]);

        let rollback = plan.steps["web"].rollback.as_ref().expect("rollback");
        let ParamValue::List(ids) = &rollback.parameters["InstanceIds"] else {
            panic!("expected a list");
        };
        assert!(matches!(ids[0], ParamValue::Placeholder(_)));
    }

    #[test]
    fn test_parse_json_plan() {
        let json = r#"{"explanation": "bucket", "deploymentOrder": ["b"],
            "steps": {"b": {"service": "s3", "operation": "create_bucket"}}}"#;
        assert_eq!(PlanParser::detect_format(json), PlanFormat::Json);

        let plan = PlanParser::new().parse(json).expect("parse");
        assert_eq!(plan.steps["b"].service, "s3");
    }

    #[test]
    fn test_parse_error_is_plan_error() {
        let err = PlanParser::new().parse("{not json").expect_err("invalid");
        assert!(matches!(err, CloudPilotError::Plan(PlanError::Parse { .. })));
    }

    #[test]
    fn test_load_file_uses_extension() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("temp file");
        file.write_all(YAML_PLAN.as_bytes()).expect("write");

        let plan = PlanParser::new().load_file(file.path()).expect("load");
        assert_eq!(plan.step_count(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let err = PlanParser::new()
            .load_file("/nonexistent/plan.json")
            .expect_err("missing");
        assert!(err.is_validation());
    }
}
