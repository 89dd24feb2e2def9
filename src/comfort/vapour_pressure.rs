//! Saturation vapour pressure over water (Hardy, ITS-90 formulation).

const G: [f64; 7] = [
    -2836.5744,
    -6028.076559,
    19.54263612,
    -0.02737830188,
    0.000016261698,
    7.0229056e-10,
    -1.8680009e-13,
];

const ZERO_CELSIUS_K: f64 = 273.15;

/// Saturation vapour pressure in hPa at air temperature `tdb` in °C.
pub fn saturation_vapour_pressure(tdb: f64) -> f64 {
    let tk = tdb + ZERO_CELSIUS_K;
    let mut es = 2.7150305 * tk.ln_1p();
    for (i, g) in G.iter().enumerate() {
        es += g * tk.powf(i as f64 - 2.0);
    }
    es.exp() * 0.01
}

/// Partial water vapour pressure in kPa, the humidity term of the UTCI.
pub fn vapour_pressure_kpa(tdb: f64, rh: f64) -> f64 {
    let eh_pa = saturation_vapour_pressure(tdb) * (rh / 100.0);
    eh_pa / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturation_pressure_at_25c() {
        assert!((saturation_vapour_pressure(25.0) - 31.988693861348917).abs() < 1e-9);
    }

    #[test]
    fn grows_with_temperature() {
        let mut last = 0.0;
        for t in (-50..=50).step_by(5) {
            let es = saturation_vapour_pressure(t as f64);
            assert!(es > last);
            last = es;
        }
    }

    #[test]
    fn humidity_scales_linearly() {
        let full = vapour_pressure_kpa(20.0, 100.0);
        assert!((vapour_pressure_kpa(20.0, 50.0) * 2.0 - full).abs() < 1e-12);
        assert_eq!(vapour_pressure_kpa(20.0, 0.0), 0.0);
    }
}
