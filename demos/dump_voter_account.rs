/// 调试 Voter 账户结构
/// 检查账户大小是否满足各布局，十六进制转储头部，并尝试解码
///
/// 输出末尾的 base64 可直接保存为 tests/fixtures/*.b64

use std::str::FromStr;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use solana_client::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use vsr_voting_power::deserializers::{DepositFilter, VoterAccount};
use vsr_voting_power::layout::{LayoutRegistry, LayoutVariant};
use vsr_voting_power::utils::{LayoutCheck, LayoutProbe};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        println!("用法: cargo run --example dump_voter_account <voter address> [rpc url]");
        return Ok(());
    }

    let address = &args[1];
    let rpc_url = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| "https://api.mainnet-beta.solana.com".to_string());
    let client = RpcClient::new(rpc_url);

    println!("🔍 调试 Voter 账户: {}\n", address);

    let pubkey = Pubkey::from_str(address).context("invalid voter address")?;
    let account = client.get_account(&pubkey).context("failed to fetch account")?;

    println!("账户信息:");
    println!("  Owner: {}", account.owner);
    println!("  大小: {} bytes", account.data.len());
    println!("  Lamports: {}", account.lamports);
    println!("\n{}", LayoutProbe::analyze_data(&account.data).to_string());

    println!("\n头部 (0..200):");
    println!("{}", LayoutProbe::hex_dump(&account.data, 0, 200));

    let registry = LayoutRegistry::with_builtin();
    let filter = DepositFilter::default();
    let now = chrono::Utc::now().timestamp().max(0) as u64;

    for name in registry.names() {
        let layout = registry.resolve(&name.parse::<LayoutVariant>()?)?;
        println!("\n{}", LayoutCheck::check(layout, &account.data).to_string());

        match VoterAccount::from_account_data(address, &account.data, layout, &filter, now) {
            Ok(voter) => {
                println!("  authority:       {}", voter.authority);
                println!("  voter_authority: {}", voter.voter_authority);
                for d in &voter.deposits {
                    println!(
                        "  ✅ @{:<5} {:>20.6} {:?} end={}{}",
                        d.slot_offset,
                        filter.to_display(d.amount_native),
                        d.lockup.kind,
                        d.lockup.end_ts,
                        if d.lockup_discarded { " (lockup discarded)" } else { "" }
                    );
                }
                for r in &voter.rejected_slots {
                    println!("  ❌ @{:<5} {:>20} {}", r.offset, r.amount_native, r.reason);
                }
            }
            Err(e) => println!("  ❌ {}", e),
        }
    }

    println!("\nbase64:\n{}", STANDARD.encode(&account.data));
    Ok(())
}
