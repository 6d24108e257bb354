use rust_decimal::{Decimal, RoundingStrategy};
use solana_client::TransactionMeta;

pub const LAMPORTS_PER_SOL: i64 = 1_000_000_000;

/// Net native movement of the whole transaction plus the fee, in SOL rounded to 4 dp.
///
/// Sums every account, not just the trading wallet, so it is directional at best.
pub fn estimate_native_profit(meta: &TransactionMeta) -> Decimal {
    let net_lamports: i128 = meta
        .pre_balances
        .iter()
        .zip(meta.post_balances.iter())
        .map(|(pre, post)| *post as i128 - *pre as i128)
        .sum();

    let with_fee = net_lamports + meta.fee as i128;

    let sol = Decimal::try_from_i128_with_scale(with_fee, 0)
        .map(|lamports| lamports / Decimal::from(LAMPORTS_PER_SOL))
        .unwrap_or(Decimal::ZERO);

    sol.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn meta(pre: Vec<u64>, post: Vec<u64>, fee: u64) -> TransactionMeta {
        TransactionMeta {
            fee,
            pre_balances: pre,
            post_balances: post,
            ..TransactionMeta::default()
        }
    }

    #[test]
    fn test_fee_only_transaction_is_zero() {
        // payer loses exactly the fee, nothing else moves
        let m = meta(vec![1_000_000_000, 50], vec![999_995_000, 50], 5_000);
        assert_eq!(estimate_native_profit(&m), Decimal::ZERO);
    }

    #[test]
    fn test_net_gain_rounded() {
        // +0.12345 SOL net, fee 5000 lamports
        let m = meta(vec![1_000_000_000], vec![1_123_445_000], 5_000);
        assert_eq!(estimate_native_profit(&m), Decimal::from_str("0.1235").unwrap());
    }

    #[test]
    fn test_net_loss() {
        let m = meta(vec![2_000_000_000, 0], vec![1_500_000_000, 0], 0);
        assert_eq!(estimate_native_profit(&m), Decimal::from_str("-0.5").unwrap());
    }

    #[test]
    fn test_mismatched_lengths_use_common_prefix() {
        let m = meta(vec![10, 1_000_000_000], vec![10], 0);
        assert_eq!(estimate_native_profit(&m), Decimal::ZERO);
    }
}
