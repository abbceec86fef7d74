use std::collections::HashMap;

use log::trace;

/// Hands out `prefix###` labels, counting separately per prefix.
#[derive(Debug, Default)]
pub struct LabelGenerator {
    counters: HashMap<&'static str, usize>,
}

impl LabelGenerator {
    pub fn new() -> LabelGenerator {
        LabelGenerator::default()
    }

    pub fn next(&mut self, prefix: &'static str) -> String {
        let counter = self.counters.entry(prefix).or_insert(0);
        *counter += 1;
        let label = format!("{}{:03}", prefix, counter);
        trace!("new label {}", label);
        label
    }
}

/// Jump targets of the enclosing loops, innermost last.
#[derive(Debug, Default)]
pub struct LoopTargets {
    breaks: Vec<String>,
    continues: Vec<String>,
}

impl LoopTargets {
    pub fn push(&mut self, break_target: String, continue_target: String) {
        self.breaks.push(break_target);
        self.continues.push(continue_target);
    }

    pub fn pop(&mut self) {
        self.breaks.pop();
        self.continues.pop();
    }

    pub fn break_target(&self) -> Option<&str> {
        self.breaks.last().map(String::as_str)
    }

    pub fn continue_target(&self) -> Option<&str> {
        self.continues.last().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_prefix() {
        let mut labels = LabelGenerator::new();
        assert_eq!(labels.next("if"), "if001");
        assert_eq!(labels.next("if"), "if002");
        assert_eq!(labels.next("loop_start"), "loop_start001");
        assert_eq!(labels.next("if"), "if003");
    }

    #[test]
    fn innermost_loop_wins() {
        let mut loops = LoopTargets::default();
        assert_eq!(loops.break_target(), None);

        loops.push("outer_end".to_owned(), "outer_start".to_owned());
        loops.push("inner_end".to_owned(), "inner_start".to_owned());
        assert_eq!(loops.break_target(), Some("inner_end"));
        assert_eq!(loops.continue_target(), Some("inner_start"));

        loops.pop();
        assert_eq!(loops.break_target(), Some("outer_end"));
        loops.pop();
        assert_eq!(loops.continue_target(), None);
    }
}
