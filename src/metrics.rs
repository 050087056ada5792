use metrics::{counter, histogram};

// Series recorded here land in whichever recorder is installed; main installs the
// Prometheus one that backs `/metrics`.

pub fn inc_requests(route: &'static str) {
    counter!("pixelphraser_requests_total", "route" => route).increment(1);
}

pub fn gate_stopped(gate: &'static str, valid: bool) {
    let valid = if valid { "true" } else { "false" };
    counter!("pixelphraser_gate_stops_total", "gate" => gate, "valid" => valid).increment(1);
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    histogram!("pixelphraser_stage_ms", "stage" => stage).record(elapsed_ms as f64);
}
