#![no_main]

use libfuzzer_sys::fuzz_target;
use modstat::job_record::JobAttributes;
use modstat::node_spec::NodeSpec;
use modstat::script::ScriptAnalysis;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    // Job scripts are read lossily, so any bytes are a valid script
    let text = String::from_utf8_lossy(data);
    let analysis = ScriptAnalysis::from_lines(text.lines());
    let _ = analysis.used();

    let _ = JobAttributes::from_bytes(data, Path::new("fuzz.JB"));
    if let Ok(input) = std::str::from_utf8(data) {
        let _ = NodeSpec::decode(Some(input));
    }
});
