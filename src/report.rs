//! 运行报告：按 计划 -> 各步 transcript -> 各步评审 -> 最终简报 的顺序渲染为文本

use crate::core::trace::{RunTrace, Verdict};
use crate::core::RunFailure;

/// 按行累积的报告文本
#[derive(Default)]
struct Report(String);

impl Report {
    fn line(&mut self, text: impl AsRef<str>) {
        self.0.push_str(text.as_ref());
        self.0.push('\n');
    }

    fn section(&mut self, title: &str) {
        self.line(format!("\n========== {} ==========", title));
    }

    fn raw(&mut self, text: &str) {
        self.0.push_str(text);
    }
}

fn verdict_label(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Accept => "ACCEPT",
        Verdict::AcceptWithNotes => "ACCEPT_WITH_NOTES",
    }
}

fn write_trace(out: &mut Report, trace: &RunTrace) {
    out.line(format!("GOAL: {}", trace.goal));
    for (key, value) in &trace.context {
        out.line(format!("CONTEXT: {} = {}", key, value));
    }

    out.section("PLAN");
    for step in &trace.plan {
        out.line(format!("{}. {}", step.index, step.description));
    }

    for record in &trace.results {
        let r = &record.result;
        out.section(&format!("STEP {} EXECUTION TRACE", r.step.index));
        out.line(&r.step.description);
        out.raw(&r.transcript.render());
        out.line(format!(
            "-- status: {} after {} iteration(s)",
            r.terminated_reason.label(),
            r.iterations_used
        ));
        out.line(format!("-- result: {}", r.final_text));
    }

    if let Some(partial) = &trace.interrupted {
        out.section(&format!("STEP {} INTERRUPTED", partial.step.index));
        out.line(&partial.step.description);
        out.raw(&partial.transcript.render());
        out.line(format!(
            "-- cancelled after {} iteration(s)",
            partial.iterations_used
        ));
    }

    for record in &trace.results {
        let c = &record.critique;
        out.section(&format!("STEP {} CRITIQUE", c.step_index));
        out.line(format!("verdict: {}", verdict_label(c.verdict)));
        for issue in &c.issues {
            out.line(format!("- {}", issue));
        }
        if let Some(revision) = &c.revision {
            out.line(format!("revised: {}", revision));
        }
    }

    if let Some(brief) = &trace.final_brief {
        out.section("FINAL BRIEF");
        out.line(brief);
    }
}

pub fn render_trace(trace: &RunTrace) -> String {
    let mut out = Report::default();
    write_trace(&mut out, trace);
    out.0
}

/// 失败时先渲染部分轨迹，再附上失败阶段与原因
pub fn render_failure(failure: &RunFailure) -> String {
    let mut out = Report::default();
    write_trace(&mut out, &failure.trace);
    out.section("RUN FAILED");
    out.line(format!("stage: {}", failure.stage));
    out.line(format!("reason: {}", failure.error));
    out.line(format!(
        "steps recorded: {} of {}",
        failure.trace.results.len(),
        failure.trace.plan.len()
    ));
    out.0
}
