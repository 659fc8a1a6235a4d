/// 探测未知布局中的候选字段
/// 列出所有落在金额范围内的 u64 以及非零 32 字节窗口，用于编写 [[layout.custom]]

use std::str::FromStr;

use anyhow::{Context, Result};
use solana_client::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use vsr_voting_power::deserializers::DepositFilter;
use vsr_voting_power::layout::{DEPOSIT_ENTRIES_OFFSET, DEPOSIT_ENTRY_LEN};
use vsr_voting_power::utils::LayoutProbe;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        println!("用法: cargo run --example probe_deposit_offsets <voter address> [rpc url]");
        return Ok(());
    }

    let rpc_url = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| "https://api.mainnet-beta.solana.com".to_string());
    let client = RpcClient::new(rpc_url);
    let pubkey = Pubkey::from_str(&args[1]).context("invalid voter address")?;
    let data = client.get_account_data(&pubkey).context("failed to fetch account")?;

    println!("🔍 {} ({} bytes)\n", pubkey, data.len());

    println!("非零 32 字节窗口 (步长 8):");
    let windows = LayoutProbe::find_pubkey_fields(&data[..data.len().min(DEPOSIT_ENTRIES_OFFSET + 32)], 8);
    for offset in windows {
        let key = Pubkey::try_from(&data[offset..offset + 32]).map(|k| k.to_string()).unwrap_or_default();
        println!("  @{:<5} {}", offset, key);
    }

    let filter = DepositFilter::default();
    println!("\n候选金额 (范围 {} - {}):", filter.min_amount, filter.max_amount);
    for (offset, value) in LayoutProbe::find_amount_candidates(&data, DEPOSIT_ENTRIES_OFFSET, &filter) {
        let entry = (offset - DEPOSIT_ENTRIES_OFFSET) / DEPOSIT_ENTRY_LEN;
        let within = (offset - DEPOSIT_ENTRIES_OFFSET) % DEPOSIT_ENTRY_LEN;
        println!(
            "  @{:<5} entry {:>2} +{:<2} {:>20.6}",
            offset,
            entry,
            within,
            filter.to_display(value)
        );
    }

    Ok(())
}
