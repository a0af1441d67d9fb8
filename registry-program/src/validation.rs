#![forbid(unsafe_code)]

use crate::instruction::UpdateNeuronStatusArgs;
use registry_core::InstructionError;

/// Upper bound of the reputation metric scale.
pub const MAX_METRIC: u64 = 10_000;

/// Check subnet capacity settings.
///
/// `neuron_count` is the current high-water mark (0 for a new subnet).
pub fn validate_caps(
    max_neurons: u8,
    validator_limit: u8,
    neuron_count: u16,
) -> Result<(), InstructionError> {
    if max_neurons == 0 || u16::from(max_neurons) < neuron_count {
        return Err(InstructionError::InvalidMaxNeurons {
            value: u16::from(max_neurons),
        });
    }
    if validator_limit > max_neurons {
        return Err(InstructionError::InvalidValidatorLimit {
            value: u16::from(validator_limit),
            max_neurons: u16::from(max_neurons),
        });
    }
    Ok(())
}

/// Narrow a caller-supplied cap to the stored width.
pub fn narrow_max_neurons(value: u16) -> Result<u8, InstructionError> {
    match u8::try_from(value) {
        Ok(v) if v >= 1 => Ok(v),
        _ => Err(InstructionError::InvalidMaxNeurons { value }),
    }
}

pub fn narrow_validator_limit(value: u16, max_neurons: u16) -> Result<u8, InstructionError> {
    if value > max_neurons {
        return Err(InstructionError::InvalidValidatorLimit { value, max_neurons });
    }
    u8::try_from(value).map_err(|_| InstructionError::InvalidValidatorLimit { value, max_neurons })
}

pub fn validate_metrics(args: &UpdateNeuronStatusArgs) -> Result<(), InstructionError> {
    for (field, value) in [
        ("rank", args.rank),
        ("trust", args.trust),
        ("incentive", args.incentive),
        ("validator_trust", args.validator_trust),
    ] {
        if let Some(v) = value {
            if v > MAX_METRIC {
                return Err(InstructionError::MetricOutOfRange {
                    field: field.to_string(),
                    value: v,
                });
            }
        }
    }
    Ok(())
}
