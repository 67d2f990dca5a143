#![no_main]

use libfuzzer_sys::fuzz_target;
use xbexploder::{
    write::{HeaderSerializer, LayoutPlanner, SectionConfig},
    XbeImage,
};

fuzz_target!(|data: &[u8]| {
    let Ok(mut image) = XbeImage::parse(data) else {
        return;
    };

    if let Ok(header) = HeaderSerializer::new(&image).serialize() {
        let _ = XbeImage::parse(header.as_bytes());
    }

    if let Ok(plan) = LayoutPlanner::new(&image, &SectionConfig::default()).plan("fuzz", 0x100) {
        plan.apply(&mut image);
        let _ = HeaderSerializer::new(&image).serialize();
    }
});
