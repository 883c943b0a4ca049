use bitcoin::blockdata::opcodes;
use bitcoin::Transaction;

use crate::error::Error;
use crate::Result;

/// Returns the payload pushed by the first OP_RETURN output of the tx
pub fn extract_op_return_data(tx: &Transaction) -> Result<Vec<u8>> {
    for output in tx.output.iter() {
        if output.script_pubkey.is_op_return() {
            let pk_script = output.script_pubkey.as_bytes();
            if pk_script.len() < 2 {
                return Ok(vec![]);
            }

            // if this is OP_PUSHDATA1, we need to drop first 3 bytes as those are related
            // to script iteslf i.e OP_RETURN + OP_PUSHDATA1 + len of bytes
            if pk_script[1] == opcodes::all::OP_PUSHDATA1.to_u8() {
                return Ok(pk_script.get(3..).unwrap_or_default().to_vec());
            } else {
                return Ok(pk_script[2..].to_vec());
            }
        }
    }
    Err(Error::MissingOpReturn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::script::{Builder, PushBytesBuf};
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, ScriptBuf, TxOut};

    fn tx_with_outputs(outputs: Vec<ScriptBuf>) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![],
            output: outputs
                .into_iter()
                .map(|script_pubkey| TxOut {
                    value: Amount::ZERO,
                    script_pubkey,
                })
                .collect(),
        }
    }

    fn op_return(payload: &[u8]) -> ScriptBuf {
        let mut push_bytes = PushBytesBuf::new();
        push_bytes.extend_from_slice(payload).unwrap();
        Builder::new()
            .push_opcode(opcodes::all::OP_RETURN)
            .push_slice(push_bytes)
            .into_script()
    }

    #[test]
    fn extracts_short_payload() {
        let payload = [7u8; 71];
        let tx = tx_with_outputs(vec![ScriptBuf::new(), op_return(&payload)]);
        assert_eq!(extract_op_return_data(&tx).unwrap(), payload.to_vec());
    }

    #[test]
    fn extracts_pushdata1_payload() {
        let payload = [9u8; 80];
        let tx = tx_with_outputs(vec![op_return(&payload)]);
        assert_eq!(extract_op_return_data(&tx).unwrap(), payload.to_vec());
    }

    #[test]
    fn missing_op_return() {
        let tx = tx_with_outputs(vec![ScriptBuf::new()]);
        assert_eq!(extract_op_return_data(&tx), Err(Error::MissingOpReturn));
    }
}
