use std::process::ExitCode;

use argh::FromArgs;
use mpc::{
    circuits::linalg,
    config::{FieldKind, SessionConfig, SupplierConfig},
    fields::{Fp97, Mersenne127, Mersenne61},
    spdz::{FakeSpdzDealer, PrecomputedSpdzDealer, SpdzDealer, SpdzMessage, SpdzShare, SpdzSuite},
    transport::{connect_multiparty, MultipartyTransport, NetChannel},
    DRes, MpcError, MpcField,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// Run one party of a demo SPDZ computation: the sum and the product of all private inputs.
struct Options {
    /// path to session configuration (JSON)
    #[argh(option, short = 'c')]
    config: String,

    /// private input of this party
    #[argh(option, short = 'i')]
    input: i64,
}

type Transport<T> = MultipartyTransport<SpdzMessage<T>, NetChannel<SpdzMessage<T>>>;

async fn evaluate<T, Dealer>(
    config: &SessionConfig,
    dealer: Dealer,
    transport: Transport<T>,
    input: i64,
) -> Result<(), MpcError>
where
    T: MpcField,
    Dealer: SpdzDealer<Field = T, Share = SpdzShare<T>>,
{
    let mut suite =
        SpdzSuite::new(dealer, transport)?.with_mac_check_threshold(config.mac_check_threshold);

    let num_parties = config.num_parties();
    let party_id = config.party_id;
    let value = T::from_i128(input.into());

    let ((sum, product), stats) = config
        .evaluator()
        .evaluate(&mut suite, move |b| {
            let inputs = b.par(move |par| {
                let inputs: Vec<_> = (0..num_parties)
                    .map(|owner| par.input(owner, (owner == party_id).then_some(value)))
                    .collect();
                Ok(DRes::ready(inputs))
            });
            Ok(b.seq(move |seq| {
                let inputs = inputs.out()?;
                let sum = linalg::sum(seq, &inputs);
                let product = linalg::product(seq, &inputs);
                let opened =
                    seq.par(move |par| Ok(DRes::ready((par.open(&sum), par.open(&product)))));
                Ok(seq.seq(move |_| {
                    let (sum, product) = opened.out()?;
                    Ok(DRes::ready((sum.out()?, product.out()?)))
                }))
            }))
        })
        .await?;

    info!(
        sum = %sum.to_signed(),
        product = %product.to_signed(),
        ?stats,
        checked_values = suite.checked_values(),
        "computation finished"
    );
    Ok(())
}

async fn run<T: MpcField>(config: &SessionConfig, input: i64) -> Result<(), MpcError> {
    info!(
        party_id = config.party_id,
        num_parties = config.num_parties(),
        field = %config.field,
        "connecting to peers"
    );
    let mut transport = connect_multiparty(&config.network, config.party_id).await?;
    if let Some(timeout) = config.receive_timeout() {
        transport = transport.with_timeout(timeout);
    }

    match &config.supplier {
        SupplierConfig::Precomputed { path } => {
            let path = config.party_path(path);
            info!(path = %path.display(), "loading preprocessed material");
            let dealer = PrecomputedSpdzDealer::<T>::from_file(&path)?;
            evaluate(config, dealer, transport, input).await
        }
        SupplierConfig::Fake { seed } => {
            let dealer = FakeSpdzDealer::<T>::new(config.num_parties(), config.party_id, *seed);
            evaluate(config, dealer, transport, input).await
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options: Options = argh::from_env();
    let result = match SessionConfig::load(&options.config) {
        Ok(config) => match config.field {
            FieldKind::Fp97 => run::<Fp97>(&config, options.input).await,
            FieldKind::Mersenne61 => run::<Mersenne61>(&config, options.input).await,
            FieldKind::Mersenne127 => run::<Mersenne127>(&config, options.input).await,
        },
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, malicious = err.is_malicious(), "party failed");
            ExitCode::FAILURE
        }
    }
}
