#![no_main]

use axethrow_core::{Vec3, Volume, intersect_segment_box};
use libfuzzer_sys::fuzz_target;

fn read_f64s(data: &[u8]) -> Option<[f64; 12]> {
    let mut out = [0.0; 12];
    for (slot, chunk) in out.iter_mut().zip(data.chunks_exact(8)) {
        let value = f64::from_le_bytes(chunk.try_into().ok()?);
        if !value.is_finite() || value.abs() > 1.0e6 {
            return None;
        }
        *slot = value;
    }
    (data.len() >= 96).then_some(out)
}

fuzz_target!(|data: &[u8]| {
    let Some(v) = read_f64s(data) else {
        return;
    };

    let volume = Volume::new(
        Vec3::new(v[0], v[1], v[2]),
        Vec3::new(v[3].abs(), v[4].abs(), v[5].abs()),
    );
    let start = Vec3::new(v[6], v[7], v[8]);
    let end = Vec3::new(v[9], v[10], v[11]);

    if let Some(hit) = intersect_segment_box(&volume, start, end) {
        let (min, max) = (volume.min(), volume.max());
        let slack = 1.0e-6 * (1.0 + max.x.abs() + max.y.abs() + max.z.abs() + min.x.abs() + min.y.abs() + min.z.abs());
        assert!(hit.x >= min.x - slack && hit.x <= max.x + slack);
        assert!(hit.y >= min.y - slack && hit.y <= max.y + slack);
        assert!(hit.z >= min.z - slack && hit.z <= max.z + slack);
    }
});
