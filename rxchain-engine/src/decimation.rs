/// Two stage decimation: `input = output * first * second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimationPlan {
    pub first: u32,
    pub second: u32,
}

/// Find decimation factors taking `input` down to `output`.
///
/// The first factor must divide both the block size and the input rate; it
/// is searched from the block size downwards, so an exact single stage
/// factor is the largest one possible. The second stage may use any factor
/// and the smallest one that works is taken. Callers check that `input` is
/// a multiple of `output` first, otherwise this never finds a plan.
pub fn plan(input: u32, output: u32, block_size: u32) -> Option<DecimationPlan> {
    if output == 0 {
        return None;
    }
    for i in (1..=block_size).rev() {
        if block_size % i != 0 || input % i != 0 {
            continue;
        }

        let intermediate = input / i;
        if intermediate == output {
            return Some(DecimationPlan {
                first: i,
                second: 1,
            });
        }

        if intermediate > output {
            if let Some(j) = (1..block_size).find(|j| intermediate / j == output) {
                return Some(DecimationPlan {
                    first: i,
                    second: j,
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_single_stage() {
        assert_eq!(plan(96, 8, 12), Some(DecimationPlan { first: 12, second: 1 }));
        assert_eq!(plan(120, 10, 12), Some(DecimationPlan { first: 12, second: 1 }));
    }

    #[test]
    fn test_tuner_rates() {
        assert_eq!(
            plan(1_152_000, 48_000, 1024),
            Some(DecimationPlan { first: 8, second: 3 })
        );
        assert_eq!(
            plan(960_000, 48_000, 1024),
            Some(DecimationPlan { first: 4, second: 5 })
        );
        assert_eq!(
            plan(480_000, 48_000, 1024),
            Some(DecimationPlan { first: 2, second: 5 })
        );
    }

    #[test]
    fn test_plans_multiply_out() {
        for (input, output) in [(2_048_000, 8_000), (1_536_000, 48_000), (768_000, 48_000)] {
            let p = plan(input, output, 1024).unwrap();
            assert_eq!(p.first * p.second * output, input);
            assert_eq!(1024 % p.first, 0);
            assert_eq!(input % p.first, 0);
        }
    }

    #[test]
    fn test_no_plan() {
        assert_eq!(plan(44_100, 48_000, 1024), None);
        assert_eq!(plan(48_000, 0, 1024), None);
    }
}
