use bytes::Bytes;
use character::state::MLUCK_RANGE;
use character::{
    ActionError, GameData, GetPlayerFilters, GetPlayersFilters, InboundEvent, ItemPick,
    LocateItemFilters, Merchant, OutboundCommand, PlayerPick,
};
use clap::Parser;
use database::DocumentStore;
use log::{debug, error, info, warn};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

mod config;
use config::{MerchantBotConfig, RoutineStep};
mod persistence;
use persistence::MerchantDatabase;

/// Largest frame accepted from the bridge.
const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

// =================================================================================================
//                                     COMMAND LINE ARGUMENTS
// =================================================================================================

#[derive(Parser, Debug)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,
}

// =================================================================================================
//                                          ENTRYPOINT
// =================================================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let config = toml::from_str::<MerchantBotConfig>(&std::fs::read_to_string(args.config)?)?;
    let settings = &config.merchant_bot_config;

    let game_data = match &settings.game_data {
        Some(path) => serde_json::from_str::<GameData>(&std::fs::read_to_string(path)?)?,
        None => GameData::default(),
    };

    info!("Connecting to database...");
    let db = MerchantDatabase::connect(
        &settings.database_uri,
        &config.bot_config,
        Duration::from_millis(settings.persist_interval_ms),
    )
    .await?;

    let addr = config.bot_config.address();
    let stream = TcpStream::connect(&addr).await?;
    info!(
        "Connected to the game bridge at {} as {} on {}",
        addr,
        config.bot_config.character,
        config.bot_config.server()
    );

    let (merchant, commands) = Merchant::new(&config.bot_config.character, game_data, settings.timeouts);
    let (reader, writer) = tokio::io::split(stream);
    let mut reader_task = tokio::spawn(read_events(reader, merchant.clone()));
    let writer_task = tokio::spawn(write_commands(writer, commands));

    tokio::select! {
        _ = run_routine(&merchant, &db, &settings.routine, Duration::from_millis(settings.step_delay_ms)) => {}
        _ = &mut reader_task => {
            warn!("The game bridge closed the connection");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    reader_task.abort();
    writer_task.abort();
    match db.persist_final(merchant.state()).await {
        Ok(true) => info!("Saved the final snapshot of {}", merchant.id()),
        Ok(false) => debug!("{} never started; no final snapshot", merchant.id()),
        Err(e) => error!("Failed to save the final snapshot: {}", e),
    }
    db.close().await;
    Ok(())
}

// =================================================================================================
//                                            ROUTINE
// =================================================================================================

async fn run_routine<S: DocumentStore>(
    merchant: &Merchant,
    db: &MerchantDatabase<S>,
    routine: &[RoutineStep],
    step_delay: Duration,
) {
    if routine.is_empty() {
        warn!("The routine is empty; only keeping the connection alive");
        std::future::pending::<()>().await;
    }

    for step in routine.iter().cycle() {
        let result = match step {
            RoutineStep::Fish => merchant.fish().await,
            RoutineStep::Mine => merchant.mine().await,
            RoutineStep::MassProduction => merchant.mass_production().await,
            RoutineStep::MerchantCourage => merchant.merchant_courage().await,
            RoutineStep::MluckNearby => mluck_nearby(merchant).await,
            RoutineStep::Sell { item, price } => sell_stack(merchant, item, *price).await,
        };

        match result {
            Ok(()) => info!("{:?} done", step),
            Err(e @ ActionError::NotReady(_)) => debug!("{}", e),
            Err(e) if e.is_timeout() => warn!("{:?}: {}", step, e),
            Err(e) => info!("{:?}: {}", step, e),
        }

        match db.persist(merchant.state()).await {
            Ok(true) => debug!("Saved a snapshot of {}", merchant.id()),
            Ok(false) => {}
            Err(e) => error!("Failed to save a snapshot of {}: {}", merchant.id(), e),
        }

        tokio::time::sleep(step_delay).await;
    }
}

/// Mlucks the nearest living player in range, or ourselves when nobody is.
async fn mluck_nearby(merchant: &Merchant) -> Result<(), ActionError> {
    let filters = GetPlayerFilters {
        filters: GetPlayersFilters {
            is_npc: Some(false),
            is_dead: Some(false),
            within_range: Some(MLUCK_RANGE),
            ..Default::default()
        },
        pick: Some(PlayerPick::Nearest),
    };
    let target = merchant
        .state()
        .read()
        .get_player(&filters)
        .map(|player| player.id.clone());
    merchant.mluck(target.as_deref().unwrap_or(merchant.id())).await
}

/// Lists our biggest stack of `item` in the first free trade slot.
async fn sell_stack(merchant: &Merchant, item: &str, price: u64) -> Result<(), ActionError> {
    let filters = LocateItemFilters {
        pick: Some(ItemPick::HighestQuantity),
        ..Default::default()
    };
    let found = {
        let state = merchant.state().read();
        let character = &state.character;
        character
            .locate_item(item, &filters)
            .and_then(|position| character.item(position).map(|stack| (position, stack.quantity())))
    };
    let (position, quantity) =
        found.ok_or_else(|| ActionError::Validation(format!("We have no {} to sell.", item)))?;
    merchant.list_for_sale(position, price, None, quantity).await
}

// =================================================================================================
//                                         BRIDGE FRAMING
// =================================================================================================

/// Feeds every event frame from the bridge into the merchant until the
/// connection drops.
async fn read_events(mut reader: ReadHalf<TcpStream>, merchant: Merchant) {
    loop {
        let payload = match read_frame(&mut reader).await {
            Ok(payload) => payload,
            Err(e) => {
                info!("Bridge connection ended: {}", e);
                break;
            }
        };

        match serde_json::from_slice::<InboundEvent>(&payload) {
            Ok(event) => {
                let kind = event.kind();
                let reached = merchant.ingest(event);
                if reached > 0 {
                    debug!("'{}' reached {} pending action(s)", kind.name(), reached);
                }
            }
            // The bridge forwards every game event; most of them aren't ours to handle
            Err(e) => debug!("Skipping frame: {}", e),
        }
    }
    merchant.mark_disconnected();
}

async fn write_commands(
    mut writer: WriteHalf<TcpStream>,
    mut commands: mpsc::UnboundedReceiver<OutboundCommand>,
) {
    while let Some(command) = commands.recv().await {
        let payload = match serde_json::to_vec(&command) {
            Ok(payload) => Bytes::from(payload),
            Err(e) => {
                error!("Could not encode '{}': {}", command.event_name(), e);
                continue;
            }
        };
        if let Err(e) = write_frame(&mut writer, &payload).await {
            error!("Failed to write to the bridge: {}", e);
            break;
        }
    }
}

async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, io::Error> {
    let len = reader.read_u32().await?;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds the {} byte limit", len, MAX_FRAME_LEN),
        ));
    }
    let mut buffer = vec![0; len as usize];
    reader.read_exact(&mut buffer).await?;
    Ok(buffer)
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<(), io::Error> {
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_are_length_prefixed() {
        let mut written = Vec::new();
        write_frame(&mut written, br#"{"event":"ui"}"#).await.unwrap();
        assert_eq!(&written[..4], &14u32.to_be_bytes());

        let mut reader = written.as_slice();
        assert_eq!(read_frame(&mut reader).await.unwrap(), br#"{"event":"ui"}"#);
    }

    #[tokio::test]
    async fn oversized_frames_are_refused() {
        let header = (MAX_FRAME_LEN + 1).to_be_bytes();
        let mut reader = &header[..];

        let err = read_frame(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
