use pimetrics::parser::{parse_adc_readings, parse_station_dump, AdcKind};

const IW_STATION_DUMP: &str = "Station 3c:22:fb:12:34:56 (on wlan0)
	inactive time:	1240 ms
	rx bytes:	8237741
	rx packets:	53902
	tx bytes:	31882712
	tx packets:	29140
	tx retries:	212
	tx failed:	0
	signal:  	-48 [-48] dBm
	tx bitrate:	65.0 MBit/s
	rx bitrate:	72.2 MBit/s
	authorized:	yes
	authenticated:	yes
	associated:	yes
	WMM/WME:	yes
	TDLS peer:	no
	DTIM period:	2
	beacon interval:100
	short slot time:yes
	connected time:	3712 seconds
	associated at [boottime]:	1834.517s
	current time:	1718111254481 ms
Station e4:5f:01:ab:cd:ef (on wlan0)
	inactive time:	30 ms
	signal:  	-61 [-61] dBm
	connected time:	58 seconds
Station 02:00:00:00:00:01 (on wlan0)
	inactive time:	0 ms
	authorized:	no
";

const PMIC_READ_ADC: &str = "   3V7_WL_SW_A current(0)=0.08246119A
     3V3_SYS_A current(1)=0.06636354A
    1V8_SYS_A current(2)=0.17370860A
   DDR_VDD2_A current(3)=0.02732618A
    VDD_CORE_A current(7)=0.86735000A
       3V7_WL_SW_V volt(8)=3.60842000V
       EXT5V_V volt(24)=5.12492000V
          BATT_V volt(25)=0.00781960V
    VDD_CORE_V volt(15)=0.72067500V
";

#[test]
fn parses_realistic_station_dump() {
    let stations = parse_station_dump(IW_STATION_DUMP);
    assert_eq!(stations.len(), 2);
    assert_eq!(stations[0].mac, "3c:22:fb:12:34:56");
    assert_eq!(stations[0].connected_time_seconds, 3712);
    assert_eq!(stations[1].mac, "e4:5f:01:ab:cd:ef");
    assert_eq!(stations[1].connected_time_seconds, 58);
}

#[test]
fn parses_realistic_pmic_output() {
    let readings = parse_adc_readings(PMIC_READ_ADC);
    assert_eq!(readings.len(), 9);
    assert_eq!(readings[0].name, "3V7_WL_SW");
    assert_eq!(readings[0].kind, AdcKind::Current);
    let core_volt = readings
        .iter()
        .find(|r| r.name == "VDD_CORE" && r.kind == AdcKind::Voltage)
        .unwrap();
    assert!((core_volt.value - 0.720675).abs() < 1e-9);
    assert_eq!(
        readings.iter().filter(|r| r.kind == AdcKind::Voltage).count(),
        4
    );
}

#[test]
fn mixed_noise_does_not_disturb_valid_lines() {
    let text = "error: unknown command\nVDD_CORE_V volt(15)=0.7206V\nVDD_CORE_A current(7)=..A\n";
    let readings = parse_adc_readings(text);
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].kind, AdcKind::Voltage);
}
