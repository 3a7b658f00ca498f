use std::process::ExitCode;

use argh::FromArgs;
use mpc::{
    config::FieldKind,
    fields::{Fp97, Mersenne127, Mersenne61},
    spdz::{generate_precomputed, PrecomputeParams},
    MpcError, MpcField,
};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// SPDZ offline preprocessing tool. Insecure: the dealer learns the authentication key.
struct Options {
    /// number of parties participating in protocol
    #[argh(option)]
    parties: usize,

    /// output path pattern ('#' is replaced with party ID)
    #[argh(option)]
    output: String,

    /// target field: 97, 61 or 127
    #[argh(option, default = "FieldKind::Mersenne127")]
    field: FieldKind,

    /// number of beaver triples to be generated
    #[argh(option)]
    beaver_triples: usize,

    /// number of random bits to be generated
    #[argh(option, default = "0")]
    random_bits: usize,

    /// number of input masks to be generated for each party
    #[argh(option)]
    input_masks: usize,

    /// number of exponentiation pipes to be generated
    #[argh(option, default = "0")]
    exp_pipes: usize,

    /// highest power contained in each exponentiation pipe
    #[argh(option, default = "0")]
    exp_pipe_length: usize,
}

impl Options {
    fn params(&self) -> PrecomputeParams {
        PrecomputeParams {
            num_parties: self.parties,
            beaver_triples: self.beaver_triples,
            random_bits: self.random_bits,
            input_masks: self.input_masks,
            exp_pipes: self.exp_pipes,
            exp_pipe_length: self.exp_pipe_length,
        }
    }
}

fn run<T: MpcField>(options: &Options) -> Result<(), MpcError> {
    if options.parties < 2 {
        return Err(MpcError::ProgrammingContract(
            "at least two parties are needed".into(),
        ));
    }
    if options.exp_pipes > 0 && options.exp_pipe_length == 0 {
        return Err(MpcError::ProgrammingContract(
            "exponentiation pipes need a positive length".into(),
        ));
    }

    let params = options.params();
    info!(?params, field = %options.field, "generating preprocessed material");
    let data = generate_precomputed::<T, _>(StdRng::from_entropy(), &params);

    for (id, party_data) in data.into_iter().enumerate() {
        let path = options.output.replace('#', &id.to_string());
        party_data.save_file(&path)?;
        info!(party_id = id, %path, "saved");
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options: Options = argh::from_env();
    let result = match options.field {
        FieldKind::Fp97 => run::<Fp97>(&options),
        FieldKind::Mersenne61 => run::<Mersenne61>(&options),
        FieldKind::Mersenne127 => run::<Mersenne127>(&options),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "preprocessing failed");
            ExitCode::FAILURE
        }
    }
}
