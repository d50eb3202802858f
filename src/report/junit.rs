use super::types::TestResults;
use crate::runner::state::{SuiteStatus, TestReport};
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub const JUNIT_FILE: &str = "junit.xml";

fn seconds(ms: u64) -> String {
    (ms as f64 / 1000.0).to_string()
}

/// Render the run as JUnit XML, one testcase per suite attempt
pub fn generate_junit_xml(results: &TestResults) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let total = results.suites.len().to_string();
    let failures = results.summary.failed.to_string();
    let skipped = results.summary.skipped.to_string();
    let time = seconds(results.summary.duration_ms);

    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", "lumi-flow-run"));
    suites_start.push_attribute(("tests", total.as_str()));
    suites_start.push_attribute(("failures", failures.as_str()));
    suites_start.push_attribute(("skipped", skipped.as_str()));
    suites_start.push_attribute(("time", time.as_str()));
    writer.write_event(Event::Start(suites_start))?;

    let mut suite_start = BytesStart::new("testsuite");
    suite_start.push_attribute(("name", "suiteExecutions"));
    suite_start.push_attribute(("tests", total.as_str()));
    suite_start.push_attribute(("failures", failures.as_str()));
    suite_start.push_attribute(("skipped", skipped.as_str()));
    suite_start.push_attribute(("id", results.run_id.as_str()));
    suite_start.push_attribute(("time", time.as_str()));
    suite_start.push_attribute(("timestamp", results.generated_at.as_str()));
    writer.write_event(Event::Start(suite_start))?;

    for suite in &results.suites {
        write_test_case(&mut writer, suite)?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let xml = String::from_utf8(writer.into_inner().into_inner())?;
    Ok(xml)
}

fn write_test_case<W: std::io::Write>(writer: &mut Writer<W>, suite: &TestReport) -> Result<()> {
    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", suite.suite_name.as_str()));
    case_start.push_attribute(("classname", "lumi-flow"));
    case_start.push_attribute(("time", seconds(suite.duration_ms()).as_str()));
    writer.write_event(Event::Start(case_start))?;

    match suite.status {
        SuiteStatus::Failed | SuiteStatus::Running => {
            let reason = suite.failure_reason.as_deref().unwrap_or("Unknown error");
            let mut fail_start = BytesStart::new("failure");
            fail_start.push_attribute(("message", reason));
            if let Some(ref step) = suite.failed_step {
                fail_start.push_attribute(("type", step.as_str()));
            }
            writer.write_event(Event::Start(fail_start))?;
            let body = suite.failure_trace.as_deref().unwrap_or(reason);
            writer.write_event(Event::Text(BytesText::new(body)))?;
            writer.write_event(Event::End(BytesEnd::new("failure")))?;
        }
        SuiteStatus::Skipped => {
            let mut skip = BytesStart::new("skipped");
            if let Some(ref reason) = suite.failure_reason {
                skip.push_attribute(("message", reason.as_str()));
            }
            writer.write_event(Event::Empty(skip))?;
        }
        SuiteStatus::Passed => {}
    }

    if !suite.steps.is_empty() {
        let lines: Vec<String> = suite
            .steps
            .iter()
            .map(|s| {
                format!(
                    "[{}] {} - {}",
                    if s.passed { "PASS" } else { "FAIL" },
                    s.step_name,
                    s.message
                )
            })
            .collect();
        writer.write_event(Event::Start(BytesStart::new("system-out")))?;
        writer.write_event(Event::Text(BytesText::new(&lines.join("\n"))))?;
        writer.write_event(Event::End(BytesEnd::new("system-out")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Write `junit.xml` into the output directory
pub fn write_report(results: &TestResults, output_dir: &Path) -> Result<PathBuf> {
    let xml = generate_junit_xml(results)?;
    let path = output_dir.join(JUNIT_FILE);
    std::fs::write(&path, xml)?;
    Ok(path)
}
