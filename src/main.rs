use clap::{Parser, Subcommand};
use serde_json::json;
use shared::{NodeError, Wallet, WalletFile};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, Level};
use xgp_core::{
    BytecodeBuilder, Chain, ChainConfig, ChainSnapshot, Contract, ContractRegistry, Miner, OpCode,
    Transaction,
};
use xgp_consensus::Replica;

const CHAIN_FILE: &str = "blockchain.json";
const WALLET_FILE: &str = "wallet.json";

#[derive(Parser)]
#[command(name = "xugenping")]
#[command(about = "Xugenping (XGP) - Nó de blockchain educacional")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new blockchain and wallet
    Init {
        /// Mining difficulty (leading zero hex digits)
        #[arg(long, default_value_t = 4)]
        difficulty: usize,
    },
    /// Check the balance of an address (defaults to the local wallet)
    Balance { address: Option<String> },
    /// Send coins to another address
    Send { recipient: String, amount: f64 },
    /// Mine pending transactions until interrupted
    Mine,
    /// Run the full node walkthrough (chain, contracts, PBFT)
    Demo,
}

#[tokio::main]
async fn main() -> shared::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Some(Commands::Init { difficulty }) => init(difficulty),
        Some(Commands::Balance { address }) => balance(address),
        Some(Commands::Send { recipient, amount }) => send(&recipient, amount),
        Some(Commands::Mine) => mine().await,
        Some(Commands::Demo) | None => demo(),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> shared::Result<T> {
    if !Path::new(path).exists() {
        return Err(NodeError::IoError(format!(
            "{path} not found - run 'init' first"
        )));
    }

    let contents = std::fs::read_to_string(path).map_err(|e| NodeError::IoError(e.to_string()))?;
    serde_json::from_str(&contents).map_err(|e| NodeError::SerializationError(e.to_string()))
}

fn write_json<T: serde::Serialize>(path: &str, value: &T) -> shared::Result<()> {
    let contents = serde_json::to_string_pretty(value)
        .map_err(|e| NodeError::SerializationError(e.to_string()))?;
    std::fs::write(path, contents).map_err(|e| NodeError::IoError(e.to_string()))
}

fn load_chain() -> shared::Result<Chain> {
    let snapshot: ChainSnapshot = read_json(CHAIN_FILE)?;
    Chain::from_snapshot(snapshot)
}

fn load_wallet() -> shared::Result<Wallet> {
    let file: WalletFile = read_json(WALLET_FILE)?;
    Wallet::from_file(&file)
}

fn init(difficulty: usize) -> shared::Result<()> {
    let chain = Chain::new(ChainConfig {
        difficulty,
        ..ChainConfig::default()
    })?;
    let wallet = Wallet::generate();

    write_json(CHAIN_FILE, &chain.snapshot())?;
    write_json(WALLET_FILE, &wallet.to_file())?;

    println!("⛓️ Blockchain inicializada com dificuldade {difficulty}");
    println!("🔑 Endereço da carteira: {}", wallet.address);
    Ok(())
}

fn balance(address: Option<String>) -> shared::Result<()> {
    let chain = load_chain()?;
    let address = match address {
        Some(address) => address,
        None => load_wallet()?.address,
    };

    println!("💰 Saldo de {address}: {} XGP", chain.balance(&address));
    Ok(())
}

fn send(recipient: &str, amount: f64) -> shared::Result<()> {
    let mut chain = load_chain()?;
    let wallet = load_wallet()?;

    let mut transaction =
        Transaction::new(wallet.address.clone(), recipient.to_string(), amount);
    transaction.sign(&wallet.keypair)?;
    chain.submit_signed(transaction, &wallet.keypair.public_key)?;

    write_json(CHAIN_FILE, &chain.snapshot())?;
    println!("💸 Transação enviada: {amount} XGP para {recipient}");
    println!(
        "📦 Transações pendentes: {}",
        chain.pending_transactions().len()
    );
    Ok(())
}

async fn mine() -> shared::Result<()> {
    let chain = Arc::new(Mutex::new(load_chain()?));
    let wallet = load_wallet()?;

    let mut miner = Miner::new(Arc::clone(&chain), wallet.address.clone());
    miner.start();
    info!("mineração iniciada; Ctrl+C para encerrar");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| NodeError::IoError(e.to_string()))?;

    miner.stop();
    let status = miner.status();
    info!(blocks = status.current_block, "mineração encerrada");

    let snapshot = chain.lock().unwrap().snapshot();
    write_json(CHAIN_FILE, &snapshot)?;
    Ok(())
}

#[allow(clippy::too_many_lines)] // Roteiro de demonstração linear
fn demo() -> shared::Result<()> {
    println!("🔗 Xugenping - Nó de blockchain educacional");
    println!("============================================");

    // 1. Cadeia e mineração
    println!("\n1. Criando cadeia e minerando um bloco...");
    let mut chain = Chain::new(ChainConfig {
        difficulty: 2,
        ..ChainConfig::default()
    })?;
    chain.add_transaction("alice", "bob", 10.0);
    chain.mine_pending("miner1")?;

    println!("   📏 Altura: {}", chain.blocks().len() - 1);
    println!("   🔐 Hash do topo: {}", chain.latest_block().hash);
    println!("   💰 Saldo miner1: {} XGP", chain.balance("miner1"));
    println!("   💰 Saldo alice:  {} XGP", chain.balance("alice"));
    println!("   ✅ Cadeia válida: {}", chain.is_valid()?);

    // 2. Carteira e admissão verificada
    println!("\n2. Assinando transação com carteira ML-DSA...");
    let wallet = Wallet::generate();
    chain.mine_pending(&wallet.address)?; // Dá fundos à carteira

    let mut transaction = Transaction::new(wallet.address.clone(), "bob".to_string(), 4.0);
    transaction.sign(&wallet.keypair)?;
    chain.submit_signed(transaction, &wallet.keypair.public_key)?;
    println!("   🔑 Endereço: {}", wallet.address);
    println!("   ✍️ Transação assinada e admitida no mempool");

    chain.mine_pending("miner1")?;
    println!("   💰 Saldo bob após mineração: {} XGP", chain.balance("bob"));

    // 3. Contratos: implantação e execução medida a gás
    println!("\n3. Implantando e executando contrato (7 + 5)...");
    let mut registry = ContractRegistry::new();
    let code = BytecodeBuilder::new()
        .push(7)
        .push(5)
        .op(OpCode::Add)
        .op(OpCode::Stop)
        .build();
    let contract = Contract::new("soma".to_string(), code, wallet.address.clone());

    let (address, deploy_cost) = registry.deploy(contract, 0.0001);
    println!("   📜 Endereço do contrato: {address}");
    println!("   ⛽ Custo de implantação: {deploy_cost} XGP");

    let execution = registry.execute(&address, &[], 0.0001)?;
    println!(
        "   🧮 Resultado: {:?} (gás usado: {}, custo: {} XGP)",
        execution.result, execution.gas_used, execution.cost
    );

    // Falha de execução não derruba o nó: custo parcial é cobrado
    let faulty = BytecodeBuilder::new()
        .push(10)
        .push(0)
        .op(OpCode::Div)
        .build();
    let faulty = Contract::new("div-zero".to_string(), faulty, wallet.address.clone());
    let (faulty_address, _) = registry.deploy(faulty, 0.0001);
    let execution = registry.execute(&faulty_address, &[], 0.0001)?;
    println!(
        "   💥 Divisão por zero: resultado {:?}, falha {:?}",
        execution.result, execution.fault
    );

    // 4. Consenso PBFT: quórum com N = 4, f = 1
    println!("\n4. Caminhada de quórum PBFT (N = 4, f = 1)...");
    let nodes: Vec<String> = ["n1", "n2", "n3", "n4"]
        .iter()
        .map(ToString::to_string)
        .collect();
    let mut primary = Replica::new("n1".to_string(), nodes.clone());
    let mut backup = Replica::new("n2".to_string(), nodes);

    let pre_prepare = primary.handle_request(json!({"op": "noop"}))?;
    println!("   📣 Primário emitiu PRE_PREPARE (seq {})", pre_prepare.seq_num);

    let prepare = backup.handle_pre_prepare(&pre_prepare)?;
    backup.handle_prepare(&prepare)?;
    let commit = backup.handle_prepare(&prepare)?.ok_or_else(|| {
        NodeError::InvalidMessage("Prepare quorum not reached".to_string())
    })?;
    println!("   🤝 Quórum de prepares: COMMIT emitido");

    backup.handle_commit(&commit)?;
    let reply = backup.handle_commit(&commit)?.ok_or_else(|| {
        NodeError::InvalidMessage("Commit quorum not reached".to_string())
    })?;
    println!("   ✅ REPLY: {:?}", reply.result);

    println!("\n🎉 Demonstração concluída!");
    Ok(())
}
